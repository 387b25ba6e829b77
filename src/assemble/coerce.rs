use crate::jvm::code::{Instruction, InvokeType};
use crate::jvm::{BaseType, BinaryName, FieldType, MethodRef, RefType};

/// Instructions converting a value of type `actual` (on top of the stack) into `expected`
///
///   - primitive to primitive is left alone (widening and narrowing are explicit operations)
///   - wrapper to primitive unboxes, going through `java/lang/Number` when both sides are numeric
///   - other references to primitive cast to the wrapper first
///   - primitive to reference boxes, then casts if the wrapper might not fit
///   - reference to reference casts unless the target is `java/lang/Object`
pub(crate) fn coercion(actual: &FieldType, expected: &FieldType) -> Vec<Instruction> {
    if actual == expected {
        return vec![];
    }
    match (actual, expected) {
        (FieldType::Base(_), FieldType::Base(_)) => vec![],

        (FieldType::Ref(actual_ref), FieldType::Base(base_type)) => {
            let unbox = |receiver: BinaryName| {
                Instruction::Invoke(
                    InvokeType::Virtual,
                    MethodRef::unbox_method(receiver, *base_type),
                )
            };
            match (actual.unboxed(), actual_ref) {
                (Some(wrapped), RefType::Object(wrapper))
                    if wrapped == *base_type || (wrapped.is_numeric() && base_type.is_numeric()) =>
                {
                    vec![unbox(wrapper.clone())]
                }
                _ => {
                    let wrapper = base_type.wrapper();
                    vec![
                        Instruction::CheckCast(RefType::Object(wrapper.clone())),
                        unbox(wrapper),
                    ]
                }
            }
        }

        (FieldType::Base(base_type), FieldType::Ref(expected_ref)) => {
            let mut insns = vec![Instruction::Invoke(
                InvokeType::Static,
                MethodRef::box_method(*base_type),
            )];
            if !boxes_into(*base_type, expected_ref) {
                insns.push(Instruction::CheckCast(expected_ref.clone()));
            }
            insns
        }

        (FieldType::Ref(_), FieldType::Ref(expected_ref)) => {
            if expected_ref == &RefType::Object(BinaryName::OBJECT) {
                vec![]
            } else {
                vec![Instruction::CheckCast(expected_ref.clone())]
            }
        }
    }
}

/// Is the wrapper of `base_type` already assignable to `target`?
fn boxes_into(base_type: BaseType, target: &RefType) -> bool {
    match target {
        RefType::Object(class) => {
            class == &BinaryName::OBJECT
                || class == &base_type.wrapper()
                || (class == &BinaryName::NUMBER && base_type.is_numeric())
        }
        _ => false,
    }
}
