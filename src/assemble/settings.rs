use crate::jvm::{FieldAccessFlags, MethodAccessFlags, UnqualifiedName};

/// Knobs for how classes get assembled
#[derive(Clone, Debug)]
pub struct Settings {
    /// How enum switch tables are shared
    pub switch_tables: SwitchTableMode,

    /// Prefix of the static `[I` field caching an enum switch table
    ///
    /// The flattened enum name gets appended, so the table for `com/example/Color` lives in
    /// `$SWITCH_TABLE$com$example$Color`.
    pub switch_table_field_prefix: UnqualifiedName,

    /// Prefix of the static method which lazily fills in a switch table
    pub switch_table_method_prefix: UnqualifiedName,

    /// Access flags of switch table fields
    pub switch_table_field_flags: FieldAccessFlags,

    /// Access flags of switch table methods
    pub switch_table_method_flags: MethodAccessFlags,

    /// Add a `return` to the end of `void` methods whose body can fall off the end
    pub synthesize_void_return: bool,

    /// Call the zero-argument super constructor at the start of constructors that never call a
    /// constructor on `this`
    pub synthesize_super_call: bool,
}

/// Scope of the ordinal-to-index tables used by enum switches
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwitchTableMode {
    /// One table per enum type, shared by every switch over that enum in the class
    PerType,

    /// A fresh table for every switch
    PerSite,
}

impl Default for Settings {
    fn default() -> Settings {
        let prefix = UnqualifiedName::SWITCH_TABLE;
        Settings {
            switch_tables: SwitchTableMode::PerType,
            switch_table_field_prefix: prefix.clone(),
            switch_table_method_prefix: prefix,
            switch_table_field_flags: FieldAccessFlags::PRIVATE
                | FieldAccessFlags::STATIC
                | FieldAccessFlags::SYNTHETIC,
            switch_table_method_flags: MethodAccessFlags::PRIVATE
                | MethodAccessFlags::STATIC
                | MethodAccessFlags::SYNTHETIC,
            synthesize_void_return: true,
            synthesize_super_call: true,
        }
    }
}
