//! Tiny interpreter for assembled classes
//!
//! Runs methods straight out of a [`Listing`], with just enough of `java.lang` modelled to
//! exercise what the assembler emits: strings (`hashCode`/`equals`), boxing of `int`, enums
//! (whose runtime constants can differ from the ones the class was assembled against),
//! iterables, and a small exception hierarchy. Exceptions are dispatched through the exception
//! table exactly like the JVM does, so protected ranges and handler order get checked too.

#![allow(dead_code)]

use classforge::assemble::{Error, TypeBuilder};
use classforge::jvm::code::{
    BranchInstruction, CodeEntry, CompareMode, Constant, EqComparison, Instruction, InvokeType,
    Label, OrdComparison, ShiftType,
};
use classforge::jvm::{
    BaseType, BinaryName, FieldType, Listing, MethodAccessFlags, MethodDescriptor,
    MethodListing, MethodRef, Name, ParseDescriptor, RenderDescriptor, UnqualifiedName, Width,
};
use std::collections::HashMap;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn name(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(String::from(name)).unwrap()
}

pub fn class_name(name: &str) -> BinaryName {
    BinaryName::from_string(String::from(name)).unwrap()
}

pub fn descriptor(descriptor: &str) -> MethodDescriptor {
    MethodDescriptor::parse(descriptor).unwrap()
}

pub fn public_static() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC
}

/// Close a class into a fresh listing
pub fn assemble(class: TypeBuilder) -> Result<Listing, Error> {
    init_logging();
    let mut listing = Listing::new();
    class.close(&mut listing)?;
    log::debug!("{}", listing);
    Ok(listing)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Val {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(usize),
}

impl Val {
    pub fn int(&self) -> i32 {
        match self {
            Val::Int(integer) => *integer,
            other => panic!("expected an int, found {:?}", other),
        }
    }

    pub fn long(&self) -> i64 {
        match self {
            Val::Long(long) => *long,
            other => panic!("expected a long, found {:?}", other),
        }
    }

    pub fn float(&self) -> f32 {
        match self {
            Val::Float(float) => *float,
            other => panic!("expected a float, found {:?}", other),
        }
    }

    pub fn double(&self) -> f64 {
        match self {
            Val::Double(double) => *double,
            other => panic!("expected a double, found {:?}", other),
        }
    }

    pub fn is_wide(&self) -> bool {
        matches!(self, Val::Long(_) | Val::Double(_))
    }
}

#[derive(Clone, Debug)]
pub enum Object {
    Str(String),
    Array(Vec<Val>),
    Boxed(Val),
    Enum {
        class: String,
        name: String,
        ordinal: i32,
    },
    Throwable {
        class: String,
        message: Option<String>,
    },
    Instance {
        class: String,
        fields: HashMap<String, Val>,
    },
    List(Vec<Val>),
    Iter {
        items: Vec<Val>,
        next: usize,
    },
}

/// How a call ended
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Return(Option<Val>),
    Throw(Val),
}

impl Outcome {
    pub fn value(self) -> Val {
        match self {
            Outcome::Return(Some(value)) => value,
            other => panic!("expected a value to be returned, got {:?}", other),
        }
    }

    pub fn int(self) -> i32 {
        self.value().int()
    }

    pub fn long(self) -> i64 {
        self.value().long()
    }
}

type Thrown = Val;

const FUEL: usize = 1_000_000;

pub struct Machine<'l> {
    listing: &'l Listing,
    heap: Vec<Object>,
    statics: HashMap<(String, String), Val>,

    /// Runtime constants of each enum, in declaration order
    enums: HashMap<String, Vec<String>>,
    enum_objects: HashMap<(String, String), usize>,

    /// Names of every method run, in call order
    pub calls: Vec<String>,

    steps: usize,
}

impl<'l> Machine<'l> {
    pub fn new(listing: &'l Listing) -> Machine<'l> {
        Machine {
            listing,
            heap: vec![],
            statics: HashMap::new(),
            enums: HashMap::new(),
            enum_objects: HashMap::new(),
            calls: vec![],
            steps: 0,
        }
    }

    /// Declare the runtime constants of an enum
    pub fn with_enum(mut self, class: &str, constants: &[&str]) -> Machine<'l> {
        let constants = constants.iter().map(|c| String::from(*c)).collect();
        self.enums.insert(String::from(class), constants);
        self
    }

    fn alloc(&mut self, object: Object) -> Val {
        self.heap.push(object);
        Val::Ref(self.heap.len() - 1)
    }

    pub fn object(&self, value: &Val) -> &Object {
        match value {
            Val::Ref(idx) => &self.heap[*idx],
            other => panic!("expected a reference, found {:?}", other),
        }
    }

    pub fn string(&mut self, string: &str) -> Val {
        self.alloc(Object::Str(String::from(string)))
    }

    pub fn boxed_int(&mut self, integer: i32) -> Val {
        self.alloc(Object::Boxed(Val::Int(integer)))
    }

    pub fn int_array(&mut self, integers: &[i32]) -> Val {
        self.alloc(Object::Array(integers.iter().map(|i| Val::Int(*i)).collect()))
    }

    pub fn list(&mut self, items: Vec<Val>) -> Val {
        self.alloc(Object::List(items))
    }

    pub fn text(&self, value: &Val) -> Option<String> {
        match value {
            Val::Null => None,
            value => match self.object(value) {
                Object::Str(string) => Some(string.clone()),
                other => panic!("expected a string, found {:?}", other),
            },
        }
    }

    pub fn array(&self, value: &Val) -> Vec<Val> {
        match self.object(value) {
            Object::Array(elements) => elements.clone(),
            other => panic!("expected an array, found {:?}", other),
        }
    }

    /// Class and message of a thrown exception
    pub fn exception(&self, value: &Val) -> (String, Option<String>) {
        match self.object(value) {
            Object::Throwable { class, message } => (class.clone(), message.clone()),
            other => panic!("expected an exception, found {:?}", other),
        }
    }

    pub fn static_field(&self, class: &str, field: &str) -> Option<Val> {
        self.statics
            .get(&(String::from(class), String::from(field)))
            .cloned()
    }

    pub fn enum_constant(&mut self, class: &str, constant: &str) -> Val {
        match self.enum_object(class, constant) {
            Some(value) => value,
            None => panic!("{} has no constant {}", class, constant),
        }
    }

    fn enum_object(&mut self, class: &str, constant: &str) -> Option<Val> {
        let key = (String::from(class), String::from(constant));
        if let Some(idx) = self.enum_objects.get(&key) {
            return Some(Val::Ref(*idx));
        }
        let ordinal = self.enums.get(class)?.iter().position(|c| c == constant)?;
        let value = self.alloc(Object::Enum {
            class: String::from(class),
            name: String::from(constant),
            ordinal: ordinal as i32,
        });
        if let Val::Ref(idx) = value {
            self.enum_objects.insert(key, idx);
        }
        Some(value)
    }

    pub fn throwable(&mut self, class: &str, message: Option<&str>) -> Val {
        self.alloc(Object::Throwable {
            class: String::from(class),
            message: message.map(String::from),
        })
    }

    fn super_class(&self, class: &str) -> Option<String> {
        let builtin = match class {
            "java/lang/Object" => return None,
            "java/lang/Throwable" => "java/lang/Object",
            "java/lang/Exception" | "java/lang/Error" => "java/lang/Throwable",
            "java/lang/RuntimeException" => "java/lang/Exception",
            "java/lang/ArithmeticException"
            | "java/lang/NullPointerException"
            | "java/lang/IllegalStateException"
            | "java/lang/IllegalArgumentException"
            | "java/lang/ArrayIndexOutOfBoundsException" => "java/lang/RuntimeException",
            "java/lang/NoSuchFieldError" => "java/lang/Error",
            other => {
                let listed = self
                    .listing
                    .classes
                    .iter()
                    .find(|listed| listed.header.name.as_str() == other);
                return Some(listed.map_or_else(
                    || String::from("java/lang/Object"),
                    |listed| String::from(listed.header.super_class.as_str()),
                ));
            }
        };
        Some(String::from(builtin))
    }

    pub fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(String::from(class));
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = self.super_class(&class);
        }
        false
    }

    fn class_of(&self, value: &Val) -> Option<String> {
        match value {
            Val::Ref(idx) => Some(match &self.heap[*idx] {
                Object::Str(_) => String::from("java/lang/String"),
                Object::Array(_) => String::from("[array"),
                Object::Boxed(_) => String::from("java/lang/Integer"),
                Object::Enum { class, .. }
                | Object::Throwable { class, .. }
                | Object::Instance { class, .. } => class.clone(),
                Object::List(_) => String::from("java/util/ArrayList"),
                Object::Iter { .. } => String::from("java/util/Iterator"),
            }),
            _ => None,
        }
    }

    fn find_method(&self, method: &MethodRef) -> Option<&'l MethodListing> {
        let listing: &'l Listing = self.listing;
        let class = listing.class(&method.class)?;
        class.method_with_descriptor(method.name.as_str(), &method.descriptor.render())
    }

    /// Call a method of an assembled class by name
    pub fn call(&mut self, class: &str, method: &str, args: Vec<Val>) -> Outcome {
        let listing: &'l Listing = self.listing;
        let listed = listing
            .class(&class_name(class))
            .and_then(|class| class.method(method))
            .unwrap_or_else(|| panic!("no method {}.{}", class, method));
        self.run(class, listed, args)
    }

    /// Allocate an instance of an assembled class and run its constructor
    pub fn construct(&mut self, class: &str, args: Vec<Val>) -> Outcome {
        let instance = self.alloc(Object::Instance {
            class: String::from(class),
            fields: HashMap::new(),
        });
        let listing: &'l Listing = self.listing;
        let ctor = listing
            .class(&class_name(class))
            .and_then(|listed| {
                listed.methods.iter().find(|method| {
                    method.header.name == UnqualifiedName::INIT
                        && method.header.descriptor.parameters.len() == args.len()
                })
            })
            .unwrap_or_else(|| panic!("no constructor of {} for {:?}", class, args));
        let mut full_args = vec![instance.clone()];
        full_args.extend(args);
        match self.run(class, ctor, full_args) {
            Outcome::Return(None) => Outcome::Return(Some(instance)),
            other => other,
        }
    }

    fn run(&mut self, class: &str, method: &'l MethodListing, args: Vec<Val>) -> Outcome {
        self.calls
            .push(format!("{}.{}", class, method.header.name.as_str()));
        assert!(
            !method.code.is_empty(),
            "{}.{} has no code",
            class,
            method.header.name.as_str()
        );

        let labels: HashMap<Label, usize> = method
            .code
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| match entry {
                CodeEntry::Label(label) => Some((*label, idx)),
                _ => None,
            })
            .collect();

        let mut locals: Vec<Option<Val>> = vec![None; usize::from(method.max_locals)];
        let mut slot = 0;
        for arg in args {
            let width = if arg.is_wide() { 2 } else { 1 };
            assert!(slot + width <= locals.len(), "max_locals too small for arguments");
            locals[slot] = Some(arg);
            slot += width;
        }

        let mut stack: Vec<Val> = vec![];
        let mut pc = 0;
        loop {
            self.steps += 1;
            assert!(self.steps < FUEL, "ran out of fuel (infinite loop?)");

            let at = pc;
            let entry = method
                .code
                .get(pc)
                .unwrap_or_else(|| panic!("fell off the end of {}", method.header.name.as_str()));
            pc += 1;

            let thrown = match entry {
                CodeEntry::Label(_) => continue,
                CodeEntry::Instruction(insn) => match self.execute(insn, &mut stack, &mut locals) {
                    Ok(()) => continue,
                    Err(thrown) => thrown,
                },
                CodeEntry::Branch(branch) => match self.branch(branch, &mut stack) {
                    Flow::Next => continue,
                    Flow::Jump(label) => {
                        pc = labels[&label];
                        continue;
                    }
                    Flow::Return(value) => return Outcome::Return(value),
                    Flow::Throw(thrown) => thrown,
                },
            };

            let thrown_class = self.class_of(&thrown).unwrap_or_default();
            let handler = method.exception_ranges.iter().find(|range| {
                labels[&range.start] <= at
                    && at < labels[&range.end]
                    && range.catch_type.as_ref().map_or(true, |catch_type| {
                        self.is_subclass(&thrown_class, catch_type.as_str())
                    })
            });
            match handler {
                Some(range) => {
                    stack.clear();
                    stack.push(thrown);
                    pc = labels[&range.handler];
                }
                None => return Outcome::Throw(thrown),
            }
        }
    }

    fn execute(
        &mut self,
        insn: &Instruction,
        stack: &mut Vec<Val>,
        locals: &mut [Option<Val>],
    ) -> Result<(), Thrown> {
        use Instruction::*;

        macro_rules! pop {
            () => {
                stack.pop().expect("operand stack underflow")
            };
        }
        macro_rules! int_op {
            ($f:expr) => {{
                let rhs = pop!().int();
                let lhs = pop!().int();
                stack.push(Val::Int($f(lhs, rhs)));
            }};
        }
        macro_rules! long_op {
            ($f:expr) => {{
                let rhs = pop!().long();
                let lhs = pop!().long();
                stack.push(Val::Long($f(lhs, rhs)));
            }};
        }
        macro_rules! float_op {
            ($f:expr) => {{
                let rhs = pop!().float();
                let lhs = pop!().float();
                stack.push(Val::Float($f(lhs, rhs)));
            }};
        }
        macro_rules! double_op {
            ($f:expr) => {{
                let rhs = pop!().double();
                let lhs = pop!().double();
                stack.push(Val::Double($f(lhs, rhs)));
            }};
        }

        match insn {
            Nop => (),
            AConstNull => stack.push(Val::Null),
            IConstM1 => stack.push(Val::Int(-1)),
            IConst0 => stack.push(Val::Int(0)),
            IConst1 => stack.push(Val::Int(1)),
            IConst2 => stack.push(Val::Int(2)),
            IConst3 => stack.push(Val::Int(3)),
            IConst4 => stack.push(Val::Int(4)),
            IConst5 => stack.push(Val::Int(5)),
            LConst0 => stack.push(Val::Long(0)),
            LConst1 => stack.push(Val::Long(1)),
            FConst0 => stack.push(Val::Float(0.0)),
            FConst1 => stack.push(Val::Float(1.0)),
            FConst2 => stack.push(Val::Float(2.0)),
            DConst0 => stack.push(Val::Double(0.0)),
            DConst1 => stack.push(Val::Double(1.0)),
            BiPush(byte) => stack.push(Val::Int(i32::from(*byte))),
            SiPush(short) => stack.push(Val::Int(i32::from(*short))),
            Ldc(constant) | Ldc2(constant) => {
                let value = match constant {
                    Constant::Integer(integer) => Val::Int(*integer),
                    Constant::Long(long) => Val::Long(*long),
                    Constant::Float(float) => Val::Float(*float),
                    Constant::Double(double) => Val::Double(*double),
                    Constant::String(string) => self.string(string),
                    Constant::Class(class) => panic!("class literals are not modelled: {:?}", class),
                };
                stack.push(value);
            }
            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) => {
                stack.push(local(locals, *idx))
            }
            IStore(idx) | FStore(idx) | AStore(idx) => {
                locals[usize::from(*idx)] = Some(pop!());
            }
            LStore(idx) | DStore(idx) => {
                locals[usize::from(*idx)] = Some(pop!());
                locals[usize::from(*idx) + 1] = None;
            }
            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => {
                let index = pop!().int();
                let array = pop!();
                let element = self.array_slot(&array, index)?;
                let element = match &self.heap[element.0] {
                    Object::Array(elements) => elements[element.1].clone(),
                    _ => unreachable!(),
                };
                stack.push(element);
            }
            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
                let value = match (insn, pop!()) {
                    (BAStore, Val::Int(i)) => Val::Int(i32::from(i as i8)),
                    (CAStore, Val::Int(i)) => Val::Int(i32::from(i as u16)),
                    (SAStore, Val::Int(i)) => Val::Int(i32::from(i as i16)),
                    (_, value) => value,
                };
                let index = pop!().int();
                let array = pop!();
                let (object, idx) = self.array_slot(&array, index)?;
                if let Object::Array(elements) = &mut self.heap[object] {
                    elements[idx] = value;
                }
            }
            Pop => {
                pop!();
            }
            Pop2 => {
                if !pop!().is_wide() {
                    pop!();
                }
            }
            Dup => {
                let top = pop!();
                stack.push(top.clone());
                stack.push(top);
            }
            DupX1 => {
                let v1 = pop!();
                let v2 = pop!();
                stack.extend([v1.clone(), v2, v1]);
            }
            DupX2 => {
                let v1 = pop!();
                let v2 = pop!();
                if v2.is_wide() {
                    stack.extend([v1.clone(), v2, v1]);
                } else {
                    let v3 = pop!();
                    stack.extend([v1.clone(), v3, v2, v1]);
                }
            }
            Dup2 => {
                let v1 = pop!();
                if v1.is_wide() {
                    stack.extend([v1.clone(), v1]);
                } else {
                    let v2 = pop!();
                    stack.extend([v2.clone(), v1.clone(), v2, v1]);
                }
            }
            Swap => {
                let v1 = pop!();
                let v2 = pop!();
                stack.extend([v1, v2]);
            }
            IAdd => int_op!(i32::wrapping_add),
            ISub => int_op!(i32::wrapping_sub),
            IMul => int_op!(i32::wrapping_mul),
            IDiv | IRem => {
                let rhs = pop!().int();
                let lhs = pop!().int();
                if rhs == 0 {
                    return Err(self.throwable("java/lang/ArithmeticException", Some("/ by zero")));
                }
                let result = if *insn == IDiv {
                    lhs.wrapping_div(rhs)
                } else {
                    lhs.wrapping_rem(rhs)
                };
                stack.push(Val::Int(result));
            }
            LAdd => long_op!(i64::wrapping_add),
            LSub => long_op!(i64::wrapping_sub),
            LMul => long_op!(i64::wrapping_mul),
            LDiv | LRem => {
                let rhs = pop!().long();
                let lhs = pop!().long();
                if rhs == 0 {
                    return Err(self.throwable("java/lang/ArithmeticException", Some("/ by zero")));
                }
                let result = if *insn == LDiv {
                    lhs.wrapping_div(rhs)
                } else {
                    lhs.wrapping_rem(rhs)
                };
                stack.push(Val::Long(result));
            }
            FAdd => float_op!(|a: f32, b: f32| a + b),
            FSub => float_op!(|a: f32, b: f32| a - b),
            FMul => float_op!(|a: f32, b: f32| a * b),
            FDiv => float_op!(|a: f32, b: f32| a / b),
            FRem => float_op!(|a: f32, b: f32| a % b),
            DAdd => double_op!(|a: f64, b: f64| a + b),
            DSub => double_op!(|a: f64, b: f64| a - b),
            DMul => double_op!(|a: f64, b: f64| a * b),
            DDiv => double_op!(|a: f64, b: f64| a / b),
            DRem => double_op!(|a: f64, b: f64| a % b),
            INeg => {
                let value = pop!().int();
                stack.push(Val::Int(value.wrapping_neg()));
            }
            LNeg => {
                let value = pop!().long();
                stack.push(Val::Long(value.wrapping_neg()));
            }
            FNeg => {
                let value = pop!().float();
                stack.push(Val::Float(-value));
            }
            DNeg => {
                let value = pop!().double();
                stack.push(Val::Double(-value));
            }
            ISh(shift) => {
                let amount = (pop!().int() & 31) as u32;
                let value = pop!().int();
                stack.push(Val::Int(match shift {
                    ShiftType::Left => value.wrapping_shl(amount),
                    ShiftType::ArithmeticRight => value >> amount,
                    ShiftType::LogicalRight => ((value as u32) >> amount) as i32,
                }));
            }
            LSh(shift) => {
                let amount = (pop!().int() & 63) as u32;
                let value = pop!().long();
                stack.push(Val::Long(match shift {
                    ShiftType::Left => value.wrapping_shl(amount),
                    ShiftType::ArithmeticRight => value >> amount,
                    ShiftType::LogicalRight => ((value as u64) >> amount) as i64,
                }));
            }
            IAnd => int_op!(|a: i32, b: i32| a & b),
            IOr => int_op!(|a: i32, b: i32| a | b),
            IXor => int_op!(|a: i32, b: i32| a ^ b),
            LAnd => long_op!(|a: i64, b: i64| a & b),
            LOr => long_op!(|a: i64, b: i64| a | b),
            LXor => long_op!(|a: i64, b: i64| a ^ b),
            IInc(idx, delta) => {
                let value = local(locals, *idx).int();
                locals[usize::from(*idx)] = Some(Val::Int(value.wrapping_add(i32::from(*delta))));
            }
            I2L => {
                let value = pop!().int();
                stack.push(Val::Long(i64::from(value)));
            }
            I2F => {
                let value = pop!().int();
                stack.push(Val::Float(value as f32));
            }
            I2D => {
                let value = pop!().int();
                stack.push(Val::Double(f64::from(value)));
            }
            L2I => {
                let value = pop!().long();
                stack.push(Val::Int(value as i32));
            }
            L2F => {
                let value = pop!().long();
                stack.push(Val::Float(value as f32));
            }
            L2D => {
                let value = pop!().long();
                stack.push(Val::Double(value as f64));
            }
            F2I => {
                let value = pop!().float();
                stack.push(Val::Int(value as i32));
            }
            F2L => {
                let value = pop!().float();
                stack.push(Val::Long(value as i64));
            }
            F2D => {
                let value = pop!().float();
                stack.push(Val::Double(f64::from(value)));
            }
            D2I => {
                let value = pop!().double();
                stack.push(Val::Int(value as i32));
            }
            D2L => {
                let value = pop!().double();
                stack.push(Val::Long(value as i64));
            }
            D2F => {
                let value = pop!().double();
                stack.push(Val::Float(value as f32));
            }
            I2B => {
                let value = pop!().int();
                stack.push(Val::Int(i32::from(value as i8)));
            }
            I2C => {
                let value = pop!().int();
                stack.push(Val::Int(i32::from(value as u16)));
            }
            I2S => {
                let value = pop!().int();
                stack.push(Val::Int(i32::from(value as i16)));
            }
            LCmp => {
                let rhs = pop!().long();
                let lhs = pop!().long();
                stack.push(Val::Int(lhs.cmp(&rhs) as i32));
            }
            FCmp(mode) | DCmp(mode) => {
                let (rhs, lhs) = match insn {
                    FCmp(_) => (f64::from(pop!().float()), f64::from(pop!().float())),
                    _ => (pop!().double(), pop!().double()),
                };
                let result = match lhs.partial_cmp(&rhs) {
                    Some(ordering) => ordering as i32,
                    None if *mode == CompareMode::G => 1,
                    None => -1,
                };
                stack.push(Val::Int(result));
            }
            GetStatic(field) => {
                let class = field.class.as_str();
                if self.enums.contains_key(class) {
                    return match self.enum_object(class, field.name.as_str()) {
                        Some(constant) => {
                            stack.push(constant);
                            Ok(())
                        }
                        None => Err(self.throwable(
                            "java/lang/NoSuchFieldError",
                            Some(field.name.as_str()),
                        )),
                    };
                }
                let key = (String::from(class), String::from(field.name.as_str()));
                let value = self
                    .statics
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| default_value(&field.descriptor));
                stack.push(value);
            }
            PutStatic(field) => {
                let value = pop!();
                let key = (
                    String::from(field.class.as_str()),
                    String::from(field.name.as_str()),
                );
                self.statics.insert(key, value);
            }
            GetField(field) => {
                let receiver = pop!();
                let value = match self.instance_fields(&receiver)? {
                    Some(fields) => fields.get(field.name.as_str()).cloned(),
                    None => None,
                };
                stack.push(value.unwrap_or_else(|| default_value(&field.descriptor)));
            }
            PutField(field) => {
                let value = pop!();
                let receiver = pop!();
                if let Val::Null = receiver {
                    return Err(self.throwable("java/lang/NullPointerException", None));
                }
                if let Val::Ref(idx) = receiver {
                    if let Object::Instance { fields, .. } = &mut self.heap[idx] {
                        fields.insert(String::from(field.name.as_str()), value);
                    }
                }
            }
            Invoke(kind, method) => {
                let argc = method.descriptor.parameters.len();
                let args = stack.split_off(stack.len() - argc);
                let receiver = match kind {
                    InvokeType::Static => None,
                    _ => Some(pop!()),
                };
                if let Some(value) = self.invoke(*kind, method, receiver, args)? {
                    stack.push(value);
                }
            }
            New(class) => {
                let class = class.as_str();
                let object = if self.is_subclass(class, "java/lang/Throwable") {
                    Object::Throwable {
                        class: String::from(class),
                        message: None,
                    }
                } else {
                    Object::Instance {
                        class: String::from(class),
                        fields: HashMap::new(),
                    }
                };
                let value = self.alloc(object);
                stack.push(value);
            }
            NewArray(base_type) => {
                let length = pop!().int();
                let element = default_value(&FieldType::Base(*base_type));
                let value = self.alloc(Object::Array(vec![element; length as usize]));
                stack.push(value);
            }
            ANewArray(_) => {
                let length = pop!().int();
                let value = self.alloc(Object::Array(vec![Val::Null; length as usize]));
                stack.push(value);
            }
            ArrayLength => {
                let array = pop!();
                stack.push(Val::Int(self.array(&array).len() as i32));
            }
            CheckCast(_) => (),
            InstanceOf(ty) => {
                let value = pop!();
                let class = self.class_of(&value);
                let target = FieldType::Ref(ty.clone()).render();
                let is = class.map_or(false, |class| {
                    let target = target.trim_start_matches('L').trim_end_matches(';');
                    self.is_subclass(&class, target)
                });
                stack.push(Val::Int(i32::from(is)));
            }
        }
        Ok(())
    }

    fn array_slot(&mut self, array: &Val, index: i32) -> Result<(usize, usize), Thrown> {
        let object = match array {
            Val::Null => return Err(self.throwable("java/lang/NullPointerException", None)),
            Val::Ref(idx) => *idx,
            other => panic!("expected an array, found {:?}", other),
        };
        let length = match &self.heap[object] {
            Object::Array(elements) => elements.len(),
            other => panic!("expected an array, found {:?}", other),
        };
        if index < 0 || index as usize >= length {
            let message = format!("Index {} out of bounds for length {}", index, length);
            return Err(self.throwable(
                "java/lang/ArrayIndexOutOfBoundsException",
                Some(&message),
            ));
        }
        Ok((object, index as usize))
    }

    fn instance_fields(&mut self, receiver: &Val) -> Result<Option<&HashMap<String, Val>>, Thrown> {
        match receiver {
            Val::Null => Err(self.throwable("java/lang/NullPointerException", None)),
            Val::Ref(idx) => match &self.heap[*idx] {
                Object::Instance { fields, .. } => Ok(Some(fields)),
                _ => Ok(None),
            },
            other => panic!("expected an object, found {:?}", other),
        }
    }

    fn invoke(
        &mut self,
        kind: InvokeType,
        method: &MethodRef,
        receiver: Option<Val>,
        args: Vec<Val>,
    ) -> Result<Option<Val>, Thrown> {
        if receiver == Some(Val::Null) {
            return Err(self.throwable("java/lang/NullPointerException", None));
        }

        if let Some(listed) = self.find_method(method) {
            let mut full_args: Vec<Val> = receiver.into_iter().collect();
            full_args.extend(args);
            return match self.run(method.class.as_str(), listed, full_args) {
                Outcome::Return(value) => Ok(value),
                Outcome::Throw(thrown) => Err(thrown),
            };
        }

        let name = method.name.as_str();
        let receiver_object = receiver.as_ref().map(|receiver| self.object(receiver).clone());
        let result = match (kind, name, receiver_object) {
            (InvokeType::Special, "<init>", Some(Object::Throwable { class, .. })) => {
                if let (Some(message), Some(Val::Ref(idx))) = (args.first(), &receiver) {
                    let message = self.text(message);
                    self.heap[*idx] = Object::Throwable { class, message };
                }
                None
            }
            (InvokeType::Special, "<init>", _) => None,
            (_, "hashCode", Some(Object::Str(string))) => Some(Val::Int(java_hash_code(&string))),
            (_, "equals", Some(Object::Str(string))) => {
                let equal = match &args[0] {
                    Val::Ref(idx) => matches!(&self.heap[*idx], Object::Str(other) if *other == string),
                    _ => false,
                };
                Some(Val::Int(i32::from(equal)))
            }
            (_, "ordinal", Some(Object::Enum { ordinal, .. })) => Some(Val::Int(ordinal)),
            (InvokeType::Static, "values", None) => {
                let class = method.class.as_str();
                let constants = self
                    .enums
                    .get(class)
                    .cloned()
                    .unwrap_or_else(|| panic!("{} is not a known enum", class));
                let elements = constants
                    .iter()
                    .map(|constant| self.enum_constant(class, constant))
                    .collect();
                Some(self.alloc(Object::Array(elements)))
            }
            (InvokeType::Static, "valueOf", None) => Some(self.alloc(Object::Boxed(args[0].clone()))),
            (_, "intValue", Some(Object::Boxed(value))) => Some(Val::Int(value.int())),
            (_, "longValue", Some(Object::Boxed(value))) => Some(match value {
                Val::Long(long) => Val::Long(long),
                other => Val::Long(i64::from(other.int())),
            }),
            (_, "iterator", Some(Object::List(items))) => {
                Some(self.alloc(Object::Iter { items, next: 0 }))
            }
            (_, "hasNext", Some(Object::Iter { items, next })) => {
                Some(Val::Int(i32::from(next < items.len())))
            }
            (_, "next", Some(Object::Iter { items, next })) => {
                if let Some(Val::Ref(idx)) = &receiver {
                    self.heap[*idx] = Object::Iter {
                        items: items.clone(),
                        next: next + 1,
                    };
                }
                Some(items[next].clone())
            }
            (_, "getMessage", Some(Object::Throwable { message, .. })) => Some(match message {
                Some(message) => self.string(&message),
                None => Val::Null,
            }),
            (kind, name, object) => panic!(
                "unsupported call {:?} {} on {:?}",
                kind, name, object
            ),
        };
        Ok(result)
    }

    fn branch(&mut self, branch: &BranchInstruction<Label>, stack: &mut Vec<Val>) -> Flow {
        use BranchInstruction::*;

        let mut pop = || stack.pop().expect("operand stack underflow");
        let take = |taken: bool, label: &Label| {
            if taken {
                Flow::Jump(*label)
            } else {
                Flow::Next
            }
        };
        match branch {
            If(cmp, label) => {
                let value = pop().int();
                take(ord(*cmp, value, 0), label)
            }
            IfICmp(cmp, label) => {
                let rhs = pop().int();
                let lhs = pop().int();
                take(ord(*cmp, lhs, rhs), label)
            }
            IfACmp(cmp, label) => {
                let rhs = pop();
                let lhs = pop();
                take((lhs == rhs) == (*cmp == EqComparison::EQ), label)
            }
            IfNull(cmp, label) => {
                let value = pop();
                take((value == Val::Null) == (*cmp == EqComparison::EQ), label)
            }
            Goto(label) => Flow::Jump(*label),
            TableSwitch {
                default,
                low,
                targets,
            } => {
                let key = i64::from(pop().int()) - i64::from(*low);
                let target = usize::try_from(key)
                    .ok()
                    .and_then(|key| targets.get(key))
                    .unwrap_or(default);
                Flow::Jump(*target)
            }
            LookupSwitch { default, targets } => {
                let key = pop().int();
                let target = targets
                    .iter()
                    .find(|(candidate, _)| *candidate == key)
                    .map_or(default, |(_, target)| target);
                Flow::Jump(*target)
            }
            IReturn | LReturn | FReturn | DReturn | AReturn => Flow::Return(Some(pop())),
            Return => Flow::Return(None),
            AThrow => match pop() {
                Val::Null => Flow::Throw(self.throwable("java/lang/NullPointerException", None)),
                thrown => Flow::Throw(thrown),
            },
        }
    }
}

enum Flow {
    Next,
    Jump(Label),
    Return(Option<Val>),
    Throw(Val),
}

fn ord(cmp: OrdComparison, lhs: i32, rhs: i32) -> bool {
    match cmp {
        OrdComparison::EQ => lhs == rhs,
        OrdComparison::NE => lhs != rhs,
        OrdComparison::LT => lhs < rhs,
        OrdComparison::LE => lhs <= rhs,
        OrdComparison::GT => lhs > rhs,
        OrdComparison::GE => lhs >= rhs,
    }
}

fn default_value(ty: &FieldType) -> Val {
    match ty {
        FieldType::Base(base_type) => match base_type.stack_type() {
            BaseType::Long => Val::Long(0),
            BaseType::Float => Val::Float(0.0),
            BaseType::Double => Val::Double(0.0),
            _ => Val::Int(0),
        },
        FieldType::Ref(_) => Val::Null,
    }
}

pub fn java_hash_code(string: &str) -> i32 {
    string
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Number of slots the parameters of a descriptor take up
pub fn parameter_slots(descriptor: &MethodDescriptor) -> usize {
    descriptor.parameters.iter().map(Width::width).sum()
}

fn local(locals: &[Option<Val>], idx: u16) -> Val {
    locals[usize::from(idx)]
        .clone()
        .unwrap_or_else(|| panic!("local {} read before being written", idx))
}
