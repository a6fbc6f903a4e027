use rand::Rng;

/// Confusable glyphs for `c`, ignoring ASCII case.
///
/// Latin letters and digits map to their QWERTY neighbours. A handful of
/// common CJK characters map to homophones that a pinyin IME offers next to
/// them, which is the usual way those get mistyped.
pub fn confusables(c: char) -> &'static [char] {
    match c.to_ascii_lowercase() {
        'a' => &['q', 'w', 's', 'z'],
        'b' => &['v', 'g', 'h', 'n'],
        'c' => &['x', 'd', 'f', 'v'],
        'd' => &['s', 'e', 'r', 'f', 'c', 'x'],
        'e' => &['w', 's', 'd', 'r'],
        'f' => &['d', 'r', 't', 'g', 'v', 'c'],
        'g' => &['f', 't', 'y', 'h', 'b', 'v'],
        'h' => &['g', 'y', 'u', 'j', 'n', 'b'],
        'i' => &['u', 'j', 'k', 'o'],
        'j' => &['h', 'u', 'i', 'k', 'm', 'n'],
        'k' => &['j', 'i', 'o', 'l', 'm'],
        'l' => &['k', 'o', 'p'],
        'm' => &['n', 'j', 'k'],
        'n' => &['b', 'h', 'j', 'm'],
        'o' => &['i', 'k', 'l', 'p'],
        'p' => &['o', 'l'],
        'q' => &['w', 'a'],
        'r' => &['e', 'd', 'f', 't'],
        's' => &['a', 'w', 'e', 'd', 'x', 'z'],
        't' => &['r', 'f', 'g', 'y'],
        'u' => &['y', 'h', 'j', 'i'],
        'v' => &['c', 'f', 'g', 'b'],
        'w' => &['q', 'a', 's', 'e'],
        'x' => &['z', 's', 'd', 'c'],
        'y' => &['t', 'g', 'h', 'u'],
        'z' => &['a', 's', 'x'],
        '1' => &['2', 'q'],
        '2' => &['1', '3', 'q', 'w'],
        '3' => &['2', '4', 'w', 'e'],
        '4' => &['3', '5', 'e', 'r'],
        '5' => &['4', '6', 'r', 't'],
        '6' => &['5', '7', 't', 'y'],
        '7' => &['6', '8', 'y', 'u'],
        '8' => &['7', '9', 'u', 'i'],
        '9' => &['8', '0', 'i', 'o'],
        '0' => &['9', 'o', 'p'],
        '的' => &['得', '地'],
        '得' => &['的', '地'],
        '地' => &['的', '得'],
        '在' => &['再'],
        '再' => &['在'],
        '做' => &['作'],
        '作' => &['做'],
        '那' => &['哪'],
        '哪' => &['那'],
        '他' => &['她', '它'],
        '她' => &['他', '它'],
        '已' => &['以'],
        '以' => &['已'],
        '好' => &['号'],
        '吗' => &['嘛', '么'],
        '呢' => &['呐'],
        '啊' => &['阿'],
        _ => &[],
    }
}

pub fn has_confusables(c: char) -> bool {
    !confusables(c).is_empty()
}

/// Pick a plausible mistyped glyph for `c`, keeping its ASCII case.
pub fn substitute(c: char, rng: &mut impl Rng) -> Option<char> {
    let candidates = confusables(c);
    if candidates.is_empty() {
        return None;
    }

    let chosen = candidates[rng.gen_range(0..candidates.len())];
    Some(if c.is_ascii_uppercase() {
        chosen.to_ascii_uppercase()
    } else {
        chosen
    })
}
