use image::Rgb;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Parses `#rgb`, `#rrggbb` (the `#` is optional) or a basic CSS color name.
pub fn parse_color(value: &str) -> Option<Rgb<u8>> {
    let value = value.trim();
    if let Some(named) = named_color(&value.to_ascii_lowercase()) {
        return Some(named);
    }
    let hex = value.strip_prefix('#').unwrap_or(value);
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (slot, ch) in out.iter_mut().zip(hex.chars()) {
                let digit = ch.to_digit(16)? as u8;
                *slot = digit * 17;
            }
            Some(Rgb(out))
        }
        6 => {
            let mut out = [0u8; 3];
            for (idx, slot) in out.iter_mut().enumerate() {
                *slot = u8::from_str_radix(&hex[idx * 2..idx * 2 + 2], 16).ok()?;
            }
            Some(Rgb(out))
        }
        _ => None,
    }
}

pub fn parse_color_or_white(value: &str) -> Rgb<u8> {
    parse_color(value).unwrap_or(WHITE)
}

pub fn to_hex(color: Rgb<u8>) -> String {
    let [r, g, b] = color.0;
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn named_color(name: &str) -> Option<Rgb<u8>> {
    let rgb = match name {
        "white" => [255, 255, 255],
        "black" => [0, 0, 0],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "pink" => [255, 192, 203],
        "gray" | "grey" => [128, 128, 128],
        _ => return None,
    };
    Some(Rgb(rgb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_forms() {
        assert_eq!(parse_color("#ff8000"), Some(Rgb([255, 128, 0])));
        assert_eq!(parse_color("FF8000"), Some(Rgb([255, 128, 0])));
        assert_eq!(parse_color("#f80"), Some(Rgb([255, 136, 0])));
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(parse_color("Red"), Some(Rgb([255, 0, 0])));
        assert_eq!(parse_color(" grey "), Some(Rgb([128, 128, 128])));
    }

    #[test]
    fn garbage_falls_back_to_white() {
        assert_eq!(parse_color_or_white("#12"), WHITE);
        assert_eq!(parse_color_or_white("#gg0000"), WHITE);
        assert_eq!(parse_color_or_white("#ffé"), WHITE);
        assert_eq!(parse_color_or_white(""), WHITE);
        assert_eq!(to_hex(parse_color_or_white("nope")), "#ffffff");
    }
}
