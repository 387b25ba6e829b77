use super::{BinaryName, Error, Name, UnqualifiedName};
use crate::util::Width;
use std::fmt;

/// Types with a textual descriptor form (`I`, `[Ljava/lang/String;`, `(JI)V`, ...)
pub trait RenderDescriptor {
    fn render(&self) -> String {
        let mut out = String::new();
        self.render_to(&mut out);
        out
    }

    /// Append the descriptor to `out`
    fn render_to(&self, out: &mut String);
}

/// Inverse of [`RenderDescriptor`]
pub trait ParseDescriptor: Sized {
    /// Parse a complete descriptor, rejecting trailing input
    fn parse(descriptor: &str) -> Result<Self, Error> {
        let mut reader = DescriptorReader::new(descriptor);
        let parsed = Self::read(&mut reader)?;
        if reader.rest().is_empty() {
            Ok(parsed)
        } else {
            Err(reader.fail(format!("trailing input '{}'", reader.rest())))
        }
    }

    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error>;
}

/// Cursor over a descriptor being parsed
pub struct DescriptorReader<'a> {
    descriptor: &'a str,
    offset: usize,
}

impl<'a> DescriptorReader<'a> {
    pub fn new(descriptor: &'a str) -> DescriptorReader<'a> {
        DescriptorReader {
            descriptor,
            offset: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.descriptor[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.peek()?;
        self.offset += next.len_utf8();
        Some(next)
    }

    fn eat(&mut self, expected: char) -> bool {
        let matched = self.peek() == Some(expected);
        if matched {
            self.offset += expected.len_utf8();
        }
        matched
    }

    /// Consume up to (and including) `terminator`, returning what came before it
    fn until(&mut self, terminator: char) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(terminator)?;
        self.offset += end + terminator.len_utf8();
        Some(&rest[..end])
    }

    fn fail(&self, reason: impl Into<String>) -> Error {
        Error::MalformedDescriptor {
            descriptor: self.descriptor.to_owned(),
            reason: reason.into(),
        }
    }

    fn unexpected(&self, wanted: &str) -> Error {
        match self.peek() {
            Some(found) => self.fail(format!(
                "expected {} at offset {}, found '{}'",
                wanted, self.offset, found
            )),
            None => self.fail(format!("expected {} but the descriptor ended", wanted)),
        }
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl Width for BaseType {
    fn width(&self) -> usize {
        if matches!(self, BaseType::Long | BaseType::Double) {
            2
        } else {
            1
        }
    }
}

impl BaseType {
    pub const ALL: [BaseType; 8] = [
        BaseType::Byte,
        BaseType::Char,
        BaseType::Double,
        BaseType::Float,
        BaseType::Int,
        BaseType::Long,
        BaseType::Short,
        BaseType::Boolean,
    ];

    /// One-letter descriptor
    pub const fn code(&self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    pub fn from_code(code: char) -> Option<BaseType> {
        BaseType::ALL.into_iter().find(|base| base.code() == code)
    }

    /// Type the value has once it is on the operand stack
    ///
    /// Everything narrower than `int` is widened to `int`.
    pub const fn stack_type(&self) -> BaseType {
        match self {
            BaseType::Long | BaseType::Float | BaseType::Double => *self,
            _ => BaseType::Int,
        }
    }

    /// Class used to box values of this type
    pub const fn wrapper(&self) -> BinaryName {
        match self {
            BaseType::Byte => BinaryName::BYTE,
            BaseType::Char => BinaryName::CHARACTER,
            BaseType::Double => BinaryName::DOUBLE,
            BaseType::Float => BinaryName::FLOAT,
            BaseType::Int => BinaryName::INTEGER,
            BaseType::Long => BinaryName::LONG,
            BaseType::Short => BinaryName::SHORT,
            BaseType::Boolean => BinaryName::BOOLEAN,
        }
    }

    /// Inverse of [`BaseType::wrapper`]
    pub fn from_wrapper(class: &BinaryName) -> Option<BaseType> {
        BaseType::ALL.into_iter().find(|base| &base.wrapper() == class)
    }

    /// Wrapper method extracting the primitive (eg. `intValue`)
    pub const fn unbox_method_name(&self) -> UnqualifiedName {
        match self {
            BaseType::Byte => UnqualifiedName::BYTEVALUE,
            BaseType::Char => UnqualifiedName::CHARVALUE,
            BaseType::Double => UnqualifiedName::DOUBLEVALUE,
            BaseType::Float => UnqualifiedName::FLOATVALUE,
            BaseType::Int => UnqualifiedName::INTVALUE,
            BaseType::Long => UnqualifiedName::LONGVALUE,
            BaseType::Short => UnqualifiedName::SHORTVALUE,
            BaseType::Boolean => UnqualifiedName::BOOLEANVALUE,
        }
    }

    /// Whether the wrapper class extends `java/lang/Number`
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, BaseType::Char | BaseType::Boolean)
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, out: &mut String) {
        out.push(self.code());
    }
}

impl ParseDescriptor for BaseType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        match reader.peek().and_then(BaseType::from_code) {
            Some(base) => {
                reader.bump();
                Ok(base)
            }
            None => Err(reader.unexpected("a primitive type")),
        }
    }
}

/// Reference type: a class or an array
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(BinaryName),
    Array(Box<FieldType>),
}

impl RefType {
    pub const fn object(class_name: BinaryName) -> RefType {
        RefType::Object(class_name)
    }

    /// Array whose elements have the given type
    pub fn array(element: FieldType) -> RefType {
        RefType::Array(Box::new(element))
    }

    /// Type of the elements, if this is an array type
    pub fn element_type(&self) -> Option<FieldType> {
        match self {
            RefType::Object(_) => None,
            RefType::Array(element) => Some(FieldType::clone(element)),
        }
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, out: &mut String) {
        out.push('L');
        out.push_str(self.as_str());
        out.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        if !reader.eat('L') {
            return Err(reader.unexpected("'L'"));
        }
        let name = reader
            .until(';')
            .ok_or_else(|| reader.fail("class name is missing its ';'"))?;
        BinaryName::from_string(name.to_owned()).map_err(|reason| reader.fail(reason))
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, out: &mut String) {
        match self {
            RefType::Object(class) => class.render_to(out),
            RefType::Array(element) => {
                out.push('[');
                element.render_to(out);
            }
        }
    }
}

impl ParseDescriptor for RefType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        if reader.eat('[') {
            FieldType::read(reader).map(RefType::array)
        } else if reader.peek() == Some('L') {
            BinaryName::read(reader).map(RefType::Object)
        } else {
            Err(reader.unexpected("a reference type"))
        }
    }
}

/// Type of a field, parameter, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base) => base.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl FieldType {
    pub fn array(element: FieldType) -> FieldType {
        FieldType::Ref(RefType::array(element))
    }

    pub const fn object(class_name: BinaryName) -> FieldType {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType {
        FieldType::Base(BaseType::Double)
    }

    pub const fn char() -> FieldType {
        FieldType::Base(BaseType::Char)
    }

    pub const fn short() -> FieldType {
        FieldType::Base(BaseType::Short)
    }

    pub const fn byte() -> FieldType {
        FieldType::Base(BaseType::Byte)
    }

    pub const fn boolean() -> FieldType {
        FieldType::Base(BaseType::Boolean)
    }

    pub const fn string() -> FieldType {
        FieldType::object(BinaryName::STRING)
    }

    pub const fn is_reference(&self) -> bool {
        matches!(self, FieldType::Ref(_))
    }

    pub fn element_type(&self) -> Option<FieldType> {
        match self {
            FieldType::Ref(ref_type) => ref_type.element_type(),
            FieldType::Base(_) => None,
        }
    }

    /// Primitive boxed by this type, if it is one of the eight wrapper classes
    pub fn unboxed(&self) -> Option<BaseType> {
        match self {
            FieldType::Ref(RefType::Object(class)) => BaseType::from_wrapper(class),
            _ => None,
        }
    }

    /// Primitive type on the operand stack, looking through wrapper classes
    pub fn numeric_type(&self) -> Option<BaseType> {
        let base = match self {
            FieldType::Base(base) => Some(*base),
            boxed => boxed.unboxed(),
        };
        base.map(|base| base.stack_type())
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, out: &mut String) {
        match self {
            FieldType::Base(base) => base.render_to(out),
            FieldType::Ref(ref_type) => ref_type.render_to(out),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        match reader.peek() {
            Some('L' | '[') => RefType::read(reader).map(FieldType::Ref),
            Some(code) if BaseType::from_code(code).is_some() => {
                BaseType::read(reader).map(FieldType::Base)
            }
            _ => Err(reader.unexpected("a field type")),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Parameter and return types of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// `None` for `void`
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn new(parameters: Vec<FieldType>, return_type: Option<FieldType>) -> MethodDescriptor {
        MethodDescriptor {
            parameters,
            return_type,
        }
    }

    /// Local slots taken by the parameters, plus one for `this`
    ///
    /// The class file format caps this at 255.
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let receiver = usize::from(has_this_param);
        receiver + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, out: &mut String) {
        out.push('(');
        self.parameters.iter().for_each(|param| param.render_to(out));
        out.push(')');
        match &self.return_type {
            Some(return_type) => return_type.render_to(out),
            None => out.push('V'),
        }
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        if !reader.eat('(') {
            return Err(reader.unexpected("'('"));
        }
        let mut parameters = vec![];
        while !reader.eat(')') {
            parameters.push(FieldType::read(reader)?);
        }
        let return_type = if reader.eat('V') {
            None
        } else {
            Some(FieldType::read(reader)?)
        };
        Ok(MethodDescriptor::new(parameters, return_type))
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const INT: FieldType = FieldType::Base(BaseType::Int);
    const DOUBLE: FieldType = FieldType::Base(BaseType::Double);
    const OBJECT: FieldType = FieldType::object(BinaryName::OBJECT);
    const INTEGER: FieldType = FieldType::object(BinaryName::INTEGER);

    #[test]
    fn field_types() {
        assert_eq!(FieldType::parse("I").unwrap(), INT);
        assert_eq!(OBJECT.render(), "Ljava/lang/Object;");
        let cube = FieldType::array(FieldType::array(FieldType::array(DOUBLE)));
        assert_eq!(cube.render(), "[[[D");
        assert_eq!(FieldType::parse("[[[D").unwrap(), cube);
        assert_eq!(
            FieldType::parse("[Ljava/lang/String;").unwrap(),
            FieldType::array(FieldType::string())
        );
    }

    #[test]
    fn malformed() {
        for bad in ["", "Q", "V", "Ljava/lang/String", "II", "[", "L;"] {
            assert!(
                matches!(FieldType::parse(bad), Err(Error::MalformedDescriptor { .. })),
                "{:?} parsed",
                bad
            );
        }
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("()").is_err());
    }

    #[test]
    fn method_descriptors() {
        let descriptor =
            MethodDescriptor::parse("(IDLjava/lang/Integer;)Ljava/lang/Object;").unwrap();
        assert_eq!(descriptor.parameters, vec![INT, DOUBLE, INTEGER]);
        assert_eq!(descriptor.return_type, Some(OBJECT));
        assert_eq!(descriptor.parameter_length(true), 5);
        assert_eq!(MethodDescriptor::new(vec![], None).render(), "()V");
    }

    #[test]
    fn element_types() {
        let ints = FieldType::array(INT);
        assert_eq!(ints.element_type(), Some(INT));
        let grid = FieldType::array(FieldType::array(FieldType::string()));
        assert_eq!(grid.element_type(), Some(FieldType::array(FieldType::string())));
        assert_eq!(INT.element_type(), None);
    }

    #[test]
    fn wrappers() {
        for base in BaseType::ALL {
            assert_eq!(BaseType::from_code(base.code()), Some(base));
            assert_eq!(BaseType::from_wrapper(&base.wrapper()), Some(base));
            assert_eq!(FieldType::object(base.wrapper()).unboxed(), Some(base));
        }
        assert_eq!(OBJECT.unboxed(), None);
        assert_eq!(FieldType::short().numeric_type(), Some(BaseType::Int));
        assert_eq!(INTEGER.numeric_type(), Some(BaseType::Int));
    }
}
