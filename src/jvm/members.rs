use super::{BaseType, BinaryName, FieldType, MethodDescriptor, RenderDescriptor, UnqualifiedName};
use std::fmt;

/// Resolved reference to a field
///
/// The assembler never resolves names itself: the declaring class and descriptor are supplied by
/// whoever knows them (a metadata index, or the [`crate::assemble::TypeBuilder`] that declared
/// the field).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

/// Resolved reference to a method
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,

    /// Whether `class` is an interface (affects the constant pool entry kind)
    pub is_interface: bool,
}

impl FieldRef {
    pub fn new(class: BinaryName, name: UnqualifiedName, descriptor: FieldType) -> FieldRef {
        FieldRef {
            class,
            name,
            descriptor,
        }
    }
}

impl MethodRef {
    pub fn new(
        class: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> MethodRef {
        MethodRef {
            class,
            name,
            descriptor,
            is_interface: false,
        }
    }

    /// Mark the declaring class as an interface
    pub fn interface(mut self) -> MethodRef {
        self.is_interface = true;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    /// `java/lang/Object.<init>()V`
    pub fn object_init() -> MethodRef {
        MethodRef::no_arg_init(BinaryName::OBJECT)
    }

    /// Zero-argument constructor of a class
    pub fn no_arg_init(class: BinaryName) -> MethodRef {
        MethodRef::new(class, UnqualifiedName::INIT, MethodDescriptor::new(vec![], None))
    }

    /// `java/lang/String.hashCode()I`
    pub fn string_hash_code() -> MethodRef {
        MethodRef::new(
            BinaryName::STRING,
            UnqualifiedName::HASHCODE,
            MethodDescriptor::new(vec![], Some(FieldType::int())),
        )
    }

    /// `java/lang/String.equals(Ljava/lang/Object;)Z`
    pub fn string_equals() -> MethodRef {
        MethodRef::new(
            BinaryName::STRING,
            UnqualifiedName::EQUALS,
            MethodDescriptor::new(
                vec![FieldType::object(BinaryName::OBJECT)],
                Some(FieldType::boolean()),
            ),
        )
    }

    /// `ordinal()I` invoked on a specific enum class
    pub fn enum_ordinal(enum_type: BinaryName) -> MethodRef {
        MethodRef::new(
            enum_type,
            UnqualifiedName::ORDINAL,
            MethodDescriptor::new(vec![], Some(FieldType::int())),
        )
    }

    /// Static `values()` method generated on every enum class
    pub fn enum_values(enum_type: BinaryName) -> MethodRef {
        let array = FieldType::array(FieldType::object(enum_type.clone()));
        MethodRef::new(
            enum_type,
            UnqualifiedName::VALUES,
            MethodDescriptor::new(vec![], Some(array)),
        )
    }

    /// Static `valueOf` boxing method on the wrapper class (eg. `Integer.valueOf(I)`)
    pub fn box_method(base_type: BaseType) -> MethodRef {
        let wrapper = base_type.wrapper();
        MethodRef::new(
            wrapper.clone(),
            UnqualifiedName::VALUEOF,
            MethodDescriptor::new(
                vec![FieldType::Base(base_type)],
                Some(FieldType::object(wrapper)),
            ),
        )
    }

    /// Instance unboxing method (eg. `Integer.intValue()`)
    ///
    /// The receiver class is a parameter since every `java/lang/Number` subclass can produce all
    /// of the numeric primitive types.
    pub fn unbox_method(receiver: BinaryName, base_type: BaseType) -> MethodRef {
        MethodRef::new(
            receiver,
            base_type.unbox_method_name(),
            MethodDescriptor::new(vec![], Some(FieldType::Base(base_type))),
        )
    }

    /// `java/lang/Iterable.iterator()`
    pub fn iterable_iterator() -> MethodRef {
        MethodRef::new(
            BinaryName::ITERABLE,
            UnqualifiedName::ITERATOR,
            MethodDescriptor::new(vec![], Some(FieldType::object(BinaryName::ITERATOR))),
        )
        .interface()
    }

    /// `java/util/Iterator.hasNext()`
    pub fn iterator_has_next() -> MethodRef {
        MethodRef::new(
            BinaryName::ITERATOR,
            UnqualifiedName::HASNEXT,
            MethodDescriptor::new(vec![], Some(FieldType::boolean())),
        )
        .interface()
    }

    /// `java/util/Iterator.next()`
    pub fn iterator_next() -> MethodRef {
        MethodRef::new(
            BinaryName::ITERATOR,
            UnqualifiedName::NEXT,
            MethodDescriptor::new(vec![], Some(FieldType::object(BinaryName::OBJECT))),
        )
        .interface()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.descriptor.render())
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class, self.name, self.descriptor.render())
    }
}
