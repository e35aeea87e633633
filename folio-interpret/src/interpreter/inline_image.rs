use super::Interpreter;
use crate::color::ColorSpace;
use crate::error::{ParseError, Result};
use crate::resources::ResourceCategory;
use folio_syntax::object::read_object;
use folio_syntax::{Dict, Lexer, Name, Object, Stream, Token};

impl Interpreter {
    /// Handle `BI`: read the image dictionary up to `ID`, the data up to `EI`,
    /// and draw the image.
    pub(super) fn inline_image(&mut self, lexer: &mut Lexer<'_>) -> Result<()> {
        let mut dict = Dict::new();

        loop {
            match lexer.next() {
                token if token.is_keyword(b"ID") => break,
                Token::Name(key) => {
                    let value = match lexer.next() {
                        Token::Eof => {
                            return Err(ParseError::InlineImage("unterminated dictionary").into());
                        }
                        token => read_object(lexer, token)?,
                    };

                    let key = expand_key(key);
                    let value = expand_value(&key, value);
                    dict.insert(key, value);
                }
                Token::Eof => return Err(ParseError::InlineImage("missing ID").into()),
                _ => return Err(ParseError::InlineImage("keys must be names").into()),
            }
        }

        let data = lexer
            .read_inline_image_data()
            .ok_or(ParseError::InlineImage("missing EI"))?;

        if let Some(Object::Name(cs)) = dict.get(b"ColorSpace")
            && ColorSpace::from_name(cs).is_none()
        {
            let cs = cs.clone();
            let resolved = self.find_resource(&cs, ResourceCategory::ColorSpace)?;
            dict.insert("ColorSpace", resolved);
        }

        if dict.get_bool(b"ImageMask") == Some(true) && !dict.contains_key(b"Decode") {
            dict.insert(
                "Decode",
                Object::Array(vec![Object::Number(0.0), Object::Number(1.0)]),
            );
        }

        self.draw_image(&Stream::new(dict, data.to_vec()));

        Ok(())
    }
}

fn expand_key(key: Name) -> Name {
    let long = match key.as_bytes() {
        b"BPC" => "BitsPerComponent",
        b"CS" => "ColorSpace",
        b"D" => "Decode",
        b"DP" => "DecodeParms",
        b"F" => "Filter",
        b"H" => "Height",
        b"IM" => "ImageMask",
        b"W" => "Width",
        b"I" => "Interpolate",
        b"L" => "Length",
        _ => return key,
    };

    Name::from(long)
}

fn expand_value(key: &[u8], value: Object) -> Object {
    let expand: fn(&[u8]) -> Option<&'static str> = match key {
        b"ColorSpace" => expand_color_space,
        b"Filter" => expand_filter,
        _ => return value,
    };

    let name = |n: Name| Object::Name(expand(&n).map_or(n, Name::from));

    match value {
        Object::Name(n) => name(n),
        Object::Array(a) => Object::Array(
            a.into_iter()
                .map(|o| match o {
                    Object::Name(n) => name(n),
                    o => o,
                })
                .collect(),
        ),
        o => o,
    }
}

fn expand_color_space(name: &[u8]) -> Option<&'static str> {
    match name {
        b"G" => Some("DeviceGray"),
        b"RGB" => Some("DeviceRGB"),
        b"CMYK" => Some("DeviceCMYK"),
        b"I" => Some("Indexed"),
        _ => None,
    }
}

fn expand_filter(name: &[u8]) -> Option<&'static str> {
    match name {
        b"AHx" => Some("ASCIIHexDecode"),
        b"A85" => Some("ASCII85Decode"),
        b"LZW" => Some("LZWDecode"),
        b"Fl" => Some("FlateDecode"),
        b"RL" => Some("RunLengthDecode"),
        b"CCF" => Some("CCITTFaxDecode"),
        b"DCT" => Some("DCTDecode"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations() {
        assert_eq!(expand_key(Name::from("BPC")), Name::from("BitsPerComponent"));
        assert_eq!(expand_key(Name::from("I")), Name::from("Interpolate"));
        assert_eq!(expand_key(Name::from("Width")), Name::from("Width"));

        let cs = Object::from_bytes(b"[/I /RGB 1 <ff000000ff00>]").unwrap();
        let expected = Object::from_bytes(b"[/Indexed /DeviceRGB 1 <ff000000ff00>]").unwrap();
        assert_eq!(expand_value(b"ColorSpace", cs), expected);

        let filter = Object::Name(Name::from("Fl"));
        assert_eq!(
            expand_value(b"Filter", filter),
            Object::Name(Name::from("FlateDecode"))
        );
        assert_eq!(
            expand_value(b"Width", Object::Number(4.0)),
            Object::Number(4.0)
        );
    }
}
