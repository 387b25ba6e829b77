//! Ordinal tables for enum switches
//!
//! Switching directly on `ordinal()` would bake the enum's declaration order into the switching
//! class. Instead, every switch indexes a synthetic `int[]` mapping the runtime ordinal of each
//! constant to a dense case index (starting at 1, so that the default 0 means "no case"). The
//! table is filled in lazily on first use by a synthetic static method, one constant at a time
//! so that constants which no longer exist (`NoSuchFieldError`) are simply skipped.
//!
//! ```text
//! private static synthetic int[] $SWITCH_TABLE$demo$Color;
//!
//! private static synthetic int[] $SWITCH_TABLE$demo$Color() {
//!     int[] cached = $SWITCH_TABLE$demo$Color;
//!     if (cached != null) return cached;
//!     int[] table = new int[Color.values().length];
//!     try { table[Color.RED.ordinal()] = 1; } catch (NoSuchFieldError e) { }
//!     try { table[Color.BLUE.ordinal()] = 2; } catch (NoSuchFieldError e) { }
//!     $SWITCH_TABLE$demo$Color = table;
//!     return table;
//! }
//! ```

use super::{BlockBuilder, Error, Settings, SwitchTableMode};
use crate::jvm::code::InvokeType;
use crate::jvm::{
    BinaryName, FieldRef, FieldType, MethodDescriptor, MethodRef, Name, UnqualifiedName,
};

/// Switch tables requested by the methods of one class
#[derive(Default, Debug)]
pub(crate) struct SwitchTables {
    tables: Vec<SwitchTable>,
}

#[derive(Clone, Debug)]
pub(crate) struct SwitchTable {
    pub enum_type: BinaryName,

    /// Static `[I` field caching the table
    pub field: FieldRef,

    /// Static method returning the (lazily built) table
    pub accessor: MethodRef,

    /// Constants with a case index, where the index is the position plus one
    pub constants: Vec<UnqualifiedName>,
}

impl SwitchTables {
    /// Table to use for a new switch over `enum_type` inside `declaring`
    pub fn table_for(
        &mut self,
        declaring: &BinaryName,
        enum_type: &BinaryName,
        settings: &Settings,
    ) -> Result<usize, Error> {
        if settings.switch_tables == SwitchTableMode::PerType {
            let existing = self
                .tables
                .iter()
                .position(|table| &table.enum_type == enum_type);
            if let Some(index) = existing {
                return Ok(index);
            }
        }

        let mut suffix = enum_type.flattened().as_str().to_owned();
        let siblings = self
            .tables
            .iter()
            .filter(|table| &table.enum_type == enum_type)
            .count();
        if siblings > 0 {
            suffix.push_str(&format!("${}", siblings));
        }
        let make_name = |prefix: &UnqualifiedName| {
            UnqualifiedName::from_string(format!("{}{}", prefix, suffix))
                .map_err(Error::MalformedName)
        };
        let field_name = make_name(&settings.switch_table_field_prefix)?;
        let method_name = make_name(&settings.switch_table_method_prefix)?;

        let table_type = FieldType::array(FieldType::int());
        let table = SwitchTable {
            enum_type: enum_type.clone(),
            field: FieldRef::new(declaring.clone(), field_name, table_type.clone()),
            accessor: MethodRef::new(
                declaring.clone(),
                method_name,
                MethodDescriptor::new(vec![], Some(table_type)),
            ),
            constants: vec![],
        };
        log::debug!("Switch table {} created for {}", table.field, enum_type);
        self.tables.push(table);
        Ok(self.tables.len() - 1)
    }

    /// Case index of an enum constant, registering it if needed
    pub fn index_of(&mut self, table: usize, constant: &UnqualifiedName) -> i32 {
        let constants = &mut self.tables[table].constants;
        let position = match constants.iter().position(|known| known == constant) {
            Some(position) => position,
            None => {
                constants.push(constant.clone());
                constants.len() - 1
            }
        };
        position as i32 + 1
    }

    pub fn get(&self, table: usize) -> &SwitchTable {
        &self.tables[table]
    }

    pub fn into_tables(self) -> Vec<SwitchTable> {
        self.tables
    }
}

/// Fill in the body of the accessor method of a table
pub(crate) fn build_accessor(b: &mut BlockBuilder, table: &SwitchTable) -> Result<(), Error> {
    let enum_type = &table.enum_type;

    let cached = b.get_static(&table.field);
    let present = b.is_not_null(cached)?;
    b.if_(present, |b| b.return_value(cached))?;

    let values = b.invoke_value(
        InvokeType::Static,
        &MethodRef::enum_values(enum_type.clone()),
        None,
        &[],
    )?;
    let length = b.array_length(values)?;
    let ordinals = b.new_array(FieldType::int(), length)?;

    for (position, constant) in table.constants.iter().enumerate() {
        let member = FieldRef::new(
            enum_type.clone(),
            constant.clone(),
            FieldType::object(enum_type.clone()),
        );
        b.try_(|t| {
            t.body(|b| {
                let member = b.get_static(&member);
                let ordinal = b.invoke_value(
                    InvokeType::Virtual,
                    &MethodRef::enum_ordinal(enum_type.clone()),
                    Some(member),
                    &[],
                )?;
                let case_index = b.const_int(position as i32 + 1);
                b.array_store(ordinals, ordinal, case_index)
            })?;
            t.catch(BinaryName::NOSUCHFIELDERROR, |_, _| Ok(()))
        })?;
    }

    b.put_static(&table.field, ordinals)?;
    b.return_value(ordinals)
}
