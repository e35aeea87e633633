//! PDF objects and the object model used to access them.

use crate::lexer::{LexAnomaly, Lexer, Token};
use crate::reader::Reader;
use crate::trivia::hex_value;
use core::borrow::Borrow;
use core::fmt;
use core::ops::Deref;
use log::warn;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// A PDF name.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Name(SmallVec<[u8; 16]>);

impl Name {
    /// Create a new name from its raw representation, decoding `#xx` escapes.
    ///
    /// Malformed escapes are kept verbatim.
    pub fn new(data: &[u8]) -> Self {
        if !data.contains(&b'#') {
            return Self::from_unescaped(data);
        }

        let mut cleaned = SmallVec::new();
        let mut r = Reader::new(data);

        while let Some(b) = r.read_byte() {
            if b == b'#' {
                let escaped = r
                    .peek_byte()
                    .and_then(hex_value)
                    .zip(r.peek_nth(1).and_then(hex_value));

                if let Some((high, low)) = escaped {
                    cleaned.push(high << 4 | low);
                    r.forward();
                    r.forward();
                    continue;
                }
            }

            cleaned.push(b);
        }

        Self(cleaned)
    }

    /// Create a new name from bytes that contain no escapes.
    pub fn from_unescaped(data: &[u8]) -> Self {
        Self(SmallVec::from_slice(data))
    }

    /// The bytes of the name.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The name as a string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.0).ok()
    }
}

impl Deref for Name {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::from_unescaped(value.as_bytes())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// The identifier of an indirect object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    /// The object number.
    pub num: u32,
    /// The generation number.
    pub gen_num: u16,
}

impl ObjRef {
    /// Create a new object reference.
    pub const fn new(num: u32, gen_num: u16) -> Self {
        Self { num, gen_num }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen_num)
    }
}

/// A dictionary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dict(FxHashMap<Name, Object>);

impl Dict {
    /// Create a new, empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the previous value under that key.
    pub fn insert(&mut self, key: impl Into<Name>, value: Object) -> Option<Object> {
        self.0.insert(key.into(), value)
    }

    /// Builder-style variant of [`Dict::insert`].
    pub fn with(mut self, key: impl Into<Name>, value: Object) -> Self {
        self.insert(key, value);
        self
    }

    /// Get the raw entry under a key, without resolving references.
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.0.get(key)
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.remove(key)
    }

    /// Whether the dictionary has an entry under the key.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.0.iter()
    }

    /// Get a number entry.
    pub fn get_number(&self, key: &[u8]) -> Option<f64> {
        self.get(key)?.as_number()
    }

    /// Get a name entry.
    pub fn get_name(&self, key: &[u8]) -> Option<&Name> {
        self.get(key)?.as_name()
    }

    /// Get a boolean entry.
    pub fn get_bool(&self, key: &[u8]) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    /// Get an array entry.
    pub fn get_array(&self, key: &[u8]) -> Option<&[Object]> {
        self.get(key)?.as_array()
    }

    /// Get a dictionary entry.
    pub fn get_dict(&self, key: &[u8]) -> Option<&Dict> {
        self.get(key)?.as_dict()
    }
}

/// A stream: a dictionary together with a sequence of bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Stream {
    dict: Dict,
    data: Arc<[u8]>,
    id: Option<ObjRef>,
}

impl Stream {
    /// Create a new stream that is not (yet) an indirect object.
    pub fn new(dict: Dict, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            dict,
            data: data.into(),
            id: None,
        }
    }

    /// The stream dictionary.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// The raw, possibly still encoded, data of the stream.
    pub fn raw_data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// The identity of the stream, if it is an indirect object.
    pub fn id(&self) -> Option<ObjRef> {
        self.id
    }

    /// Set the identity of the stream.
    pub fn set_id(&mut self, id: ObjRef) {
        self.id = Some(id);
    }

    /// The names of the filters applied to the stream data.
    pub fn filters(&self) -> SmallVec<[Name; 2]> {
        match self.dict.get(b"Filter") {
            Some(Object::Name(n)) => smallvec::smallvec![n.clone()],
            Some(Object::Array(a)) => a.iter().filter_map(|o| o.as_name().cloned()).collect(),
            _ => SmallVec::new(),
        }
    }
}

/// A PDF object.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Object {
    /// The null object.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. Integers and reals are not distinguished.
    Number(f64),
    /// A name.
    Name(Name),
    /// A string.
    String(Vec<u8>),
    /// An array.
    Array(Vec<Object>),
    /// A dictionary.
    Dict(Dict),
    /// A stream.
    Stream(Stream),
    /// A reference to an indirect object.
    Ref(ObjRef),
}

impl Object {
    /// Return the number, if the object is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Return the name, if the object is one.
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Return the boolean, if the object is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the string bytes, if the object is one.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the array elements, if the object is one.
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Return the dictionary of a dictionary or stream object.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(s.dict()),
            _ => None,
        }
    }

    /// Return the stream, if the object is one.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Return the reference, if the object is one.
    pub fn as_obj_ref(&self) -> Option<ObjRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// A short description of the object type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dictionary",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "reference",
        }
    }

    /// Parse a single object from its textual representation.
    ///
    /// Unlike objects embedded in content streams, indirect references
    /// (`12 0 R`) are recognized.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SyntaxError> {
        let mut lexer = Lexer::new(data);
        let first = lexer.next();

        read_inner(&mut lexer, first, true, 0)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Name> for Object {
    fn from(value: Name) -> Self {
        Self::Name(value)
    }
}

impl From<Dict> for Object {
    fn from(value: Dict) -> Self {
        Self::Dict(value)
    }
}

impl From<Stream> for Object {
    fn from(value: Stream) -> Self {
        Self::Stream(value)
    }
}

/// An error that occurred while assembling tokens into an object.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxError {
    /// The data ended inside of an array.
    UnterminatedArray,
    /// The data ended inside of a dictionary.
    UnterminatedDict,
    /// A dictionary key was not a name.
    InvalidDictKey,
    /// A token appeared where it cannot be part of an object.
    UnexpectedToken(String),
    /// The lexer could not tokenize the data.
    Lex(LexAnomaly),
    /// Arrays and dictionaries were nested too deeply.
    TooDeep,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedArray => write!(f, "unterminated array"),
            Self::UnterminatedDict => write!(f, "unterminated dictionary"),
            Self::InvalidDictKey => write!(f, "dictionary key is not a name"),
            Self::UnexpectedToken(t) => write!(f, "unexpected token {t}"),
            Self::Lex(a) => write!(f, "{a}"),
            Self::TooDeep => write!(f, "objects nested deeper than {MAX_DEPTH} levels"),
        }
    }
}

impl core::error::Error for SyntaxError {}

/// The maximum nesting depth of arrays and dictionaries.
pub const MAX_DEPTH: usize = 256;

/// Read an object from a content stream, given its first token.
///
/// Arrays and dictionaries are read in full. The keywords `true`, `false` and
/// `null` are turned into their respective objects; any other keyword is an
/// error, since it denotes an operator rather than an operand.
pub fn read_object(lexer: &mut Lexer<'_>, first: Token) -> Result<Object, SyntaxError> {
    read_inner(lexer, first, false, 0)
}

/// Convert a keyword into the literal it denotes, if any.
pub fn keyword_literal(kw: &[u8]) -> Option<Object> {
    match kw {
        b"true" => Some(Object::Bool(true)),
        b"false" => Some(Object::Bool(false)),
        b"null" => Some(Object::Null),
        _ => None,
    }
}

fn read_inner(
    lexer: &mut Lexer<'_>,
    first: Token,
    refs: bool,
    depth: usize,
) -> Result<Object, SyntaxError> {
    if matches!(first, Token::ArrayBegin | Token::DictBegin) && depth >= MAX_DEPTH {
        return Err(SyntaxError::TooDeep);
    }

    match first {
        Token::Number(n) => {
            if refs && let Some(r) = try_read_ref(lexer, n) {
                return Ok(Object::Ref(r));
            }

            Ok(Object::Number(n))
        }
        Token::Name(n) => Ok(Object::Name(n)),
        Token::String(s) => Ok(Object::String(s)),
        Token::ArrayBegin => {
            let mut items = vec![];

            loop {
                match lexer.next() {
                    Token::ArrayEnd => return Ok(Object::Array(items)),
                    Token::Eof => return Err(SyntaxError::UnterminatedArray),
                    t => items.push(read_inner(lexer, t, refs, depth + 1)?),
                }
            }
        }
        Token::DictBegin => {
            let mut dict = Dict::new();

            loop {
                let key = match lexer.next() {
                    Token::DictEnd => return Ok(Object::Dict(dict)),
                    Token::Eof => return Err(SyntaxError::UnterminatedDict),
                    Token::Name(n) => n,
                    Token::Unknown(a) => return Err(SyntaxError::Lex(a)),
                    _ => return Err(SyntaxError::InvalidDictKey),
                };

                let value = match lexer.next() {
                    Token::Eof => return Err(SyntaxError::UnterminatedDict),
                    t => read_inner(lexer, t, refs, depth + 1)?,
                };

                // A null value is equivalent to a missing entry.
                if value != Object::Null {
                    dict.insert(key, value);
                }
            }
        }
        Token::Keyword(k) => {
            keyword_literal(&k).ok_or_else(|| SyntaxError::UnexpectedToken(k.to_string()))
        }
        Token::Unknown(a) => Err(SyntaxError::Lex(a)),
        Token::Eof => Err(SyntaxError::UnexpectedToken("end of data".to_string())),
        t @ (Token::ArrayEnd | Token::DictEnd | Token::ProcBegin | Token::ProcEnd) => {
            Err(SyntaxError::UnexpectedToken(format!("{t:?}")))
        }
    }
}

fn try_read_ref(lexer: &mut Lexer<'_>, num: f64) -> Option<ObjRef> {
    let start = lexer.position();

    let parsed = (|| {
        let Token::Number(gen_num) = lexer.next() else {
            return None;
        };

        if !lexer.next().is_keyword(b"R") || num.fract() != 0.0 || gen_num.fract() != 0.0 {
            return None;
        }

        Some(ObjRef::new(num as u32, gen_num as u16))
    })();

    if parsed.is_none() {
        lexer.seek(start);
    }

    parsed
}

/// Access to the objects of a document.
///
/// Implementations are shared between threads and must only hand out
/// immutable data.
pub trait ObjectModel: Send + Sync {
    /// Resolve an indirect object.
    fn resolve(&self, id: ObjRef) -> Option<Object>;

    /// Follow references until a direct object is reached.
    fn resolve_object(&self, obj: &Object) -> Object {
        let mut cur = obj.clone();

        // Reference cycles degrade to null.
        for _ in 0..32 {
            match cur {
                Object::Ref(r) => match self.resolve(r) {
                    Some(o) => cur = o,
                    None => {
                        warn!("failed to resolve object {r}");
                        return Object::Null;
                    }
                },
                o => return o,
            }
        }

        Object::Null
    }

    /// Get a resolved entry of a dictionary or stream object.
    fn dict_get(&self, obj: &Object, key: &[u8]) -> Option<Object> {
        let obj = self.resolve_object(obj);
        let value = obj.as_dict()?.get(key)?;

        match self.resolve_object(value) {
            Object::Null => None,
            o => Some(o),
        }
    }

    /// Get the resolved elements of an array object.
    fn array(&self, obj: &Object) -> Option<Vec<Object>> {
        match self.resolve_object(obj) {
            Object::Array(a) => Some(a.iter().map(|o| self.resolve_object(o)).collect()),
            _ => None,
        }
    }

    /// Get the decoded bytes of a stream, given the filters to undo.
    ///
    /// The default implementation only handles unfiltered data.
    fn stream_bytes(&self, stream: &Stream, filters: &[Name]) -> Option<Arc<[u8]>> {
        if filters.is_empty() {
            Some(stream.raw_data().clone())
        } else {
            warn!("unsupported stream filters {filters:?}");

            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_limit() {
        let nested = |depth: usize| {
            let mut data = "[".repeat(depth);
            data.push_str(&"]".repeat(depth));
            data
        };

        assert!(Object::from_bytes(nested(MAX_DEPTH).as_bytes()).is_ok());
        assert_eq!(
            Object::from_bytes(nested(MAX_DEPTH + 1).as_bytes()),
            Err(SyntaxError::TooDeep)
        );
        assert_eq!(
            Object::from_bytes("<< /A ".repeat(300).as_bytes()),
            Err(SyntaxError::TooDeep)
        );
    }

    #[test]
    fn parse_dict() {
        let obj = Object::from_bytes(b"<< /Type /XObject /BBox [0 0 10 20.5] /Ref 3 0 R /N null >>")
            .unwrap();
        let dict = obj.as_dict().unwrap();

        assert_eq!(dict.get_name(b"Type"), Some(&Name::from("XObject")));
        assert_eq!(
            dict.get_array(b"BBox").unwrap(),
            &[
                Object::Number(0.0),
                Object::Number(0.0),
                Object::Number(10.0),
                Object::Number(20.5)
            ]
        );
        assert_eq!(dict.get(b"Ref"), Some(&Object::Ref(ObjRef::new(3, 0))));
        assert!(!dict.contains_key(b"N"));
    }

    #[test]
    fn refs_only_when_complete() {
        let obj = Object::from_bytes(b"[1 2 3 0 R 4]").unwrap();

        assert_eq!(
            obj.as_array().unwrap(),
            &[
                Object::Number(1.0),
                Object::Number(2.0),
                Object::Ref(ObjRef::new(3, 0)),
                Object::Number(4.0)
            ]
        );
    }

    #[test]
    fn content_stream_objects_have_no_refs() {
        let mut lexer = Lexer::new(b"[1 0 R]");
        let first = lexer.next();

        assert!(matches!(
            read_object(&mut lexer, first),
            Err(SyntaxError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn unterminated() {
        assert_eq!(
            Object::from_bytes(b"[1 2"),
            Err(SyntaxError::UnterminatedArray)
        );
        assert_eq!(
            Object::from_bytes(b"<< /A 1"),
            Err(SyntaxError::UnterminatedDict)
        );
        assert_eq!(
            Object::from_bytes(b"<< 1 2 >>"),
            Err(SyntaxError::InvalidDictKey)
        );
    }

    #[test]
    fn malformed_name_escape_is_kept() {
        assert_eq!(Name::new(b"A#zz").as_bytes(), b"A#zz");
        assert_eq!(Name::new(b"A#41").as_bytes(), b"AA");
    }

    #[test]
    fn filters() {
        let stream = Stream::new(
            Dict::new().with(
                "Filter",
                Object::from_bytes(b"[/FlateDecode /DCTDecode]").unwrap(),
            ),
            Vec::<u8>::new(),
        );

        assert_eq!(
            stream.filters().as_slice(),
            &[Name::from("FlateDecode"), Name::from("DCTDecode")]
        );
    }
}
