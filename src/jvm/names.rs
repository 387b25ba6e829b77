use std::borrow::Cow;
use std::fmt;

/// Validated names
///
/// Well-known names are `const` and borrowed; everything else is checked on construction.
pub trait Name: Sized {
    /// Reason why a string is not a valid name, if it isn't
    fn check_valid(name: &str) -> Result<(), String>;

    fn as_str(&self) -> &str;

    fn from_string(name: String) -> Result<Self, String>;
}

macro_rules! name_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
        pub struct $name(Cow<'static, str>);

        impl $name {
            const fn name(value: &'static str) -> $name {
                $name(Cow::Borrowed(value))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_type! {
    /// Name of a method or field
    ///
    /// See <https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.2.2>
    UnqualifiedName
}

name_type! {
    /// Name of a class or interface, with `/` separating packages
    ///
    /// See <https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.2.1>
    BinaryName
}

impl Name for UnqualifiedName {
    fn check_valid(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err(String::from("empty unqualified name"));
        }
        if let Some(illegal) = name.chars().find(|c| matches!(c, '.' | ';' | '[' | '/')) {
            return Err(format!("'{}' contains the illegal character '{}'", name, illegal));
        }
        let special = name == "<init>" || name == "<clinit>";
        if !special && name.contains(['<', '>']) {
            return Err(format!(
                "'{}' has angle brackets but is not '<init>' or '<clinit>'",
                name
            ));
        }
        Ok(())
    }

    fn as_str(&self) -> &str {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err(String::from("empty binary name"));
        }
        name.split('/')
            .try_for_each(UnqualifiedName::check_valid)
            .map_err(|reason| format!("bad segment in class name '{}': {}", name, reason))
    }

    fn as_str(&self) -> &str {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl UnqualifiedName {
    // Methods of the JDK called by generated code
    pub const BOOLEANVALUE: Self = Self::name("booleanValue");
    pub const BYTEVALUE: Self = Self::name("byteValue");
    pub const CHARVALUE: Self = Self::name("charValue");
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");
    pub const EQUALS: Self = Self::name("equals");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const HASHCODE: Self = Self::name("hashCode");
    pub const HASNEXT: Self = Self::name("hasNext");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const ITERATOR: Self = Self::name("iterator");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const NEXT: Self = Self::name("next");
    pub const ORDINAL: Self = Self::name("ordinal");
    pub const SHORTVALUE: Self = Self::name("shortValue");
    pub const VALUEOF: Self = Self::name("valueOf");
    pub const VALUES: Self = Self::name("values");

    /// Default prefix of enum switch table members
    pub const SWITCH_TABLE: Self = Self::name("$SWITCH_TABLE$");

    // The only names allowed to contain angle brackets
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");
}

impl BinaryName {
    /// Name usable inside a member name: `com/example/Color` becomes `com$example$Color`
    pub fn flattened(&self) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(self.0.replace('/', "$")))
    }

    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ENUM: Self = Self::name("java/lang/Enum");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const ITERABLE: Self = Self::name("java/lang/Iterable");
    pub const ITERATOR: Self = Self::name("java/util/Iterator");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const NOSUCHFIELDERROR: Self = Self::name("java/lang/NoSuchFieldError");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
}
