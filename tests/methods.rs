mod common;

use classforge::assemble::{Error, TypeBuilder};
use classforge::jvm::code::{BranchInstruction, CodeEntry, Instruction, InvokeType};
use classforge::jvm::*;
use common::*;

fn class(name: &str) -> TypeBuilder {
    TypeBuilder::new(class_name(name), BinaryName::OBJECT, vec![])
}

#[test]
fn adds_constants() -> Result<(), Error> {
    let mut adder = class("demo/Adder");
    adder
        .method(name("three"), descriptor("()I"))
        .access(public_static())
        .body(|b| {
            let one = b.const_int(1);
            let two = b.const_int(2);
            let sum = b.add(one, two)?;
            b.return_value(sum)
        })?;

    let listing = assemble(adder)?;
    let three = listing.classes[0].method("three").unwrap();
    assert_eq!(three.max_locals, 0);
    assert_eq!(
        three.instructions().cloned().collect::<Vec<_>>(),
        vec![
            CodeEntry::Instruction(Instruction::IConst1),
            CodeEntry::Instruction(Instruction::IConst2),
            CodeEntry::Instruction(Instruction::IAdd),
            CodeEntry::Branch(BranchInstruction::IReturn),
        ]
    );

    let mut machine = Machine::new(&listing);
    assert_eq!(machine.call("demo/Adder", "three", vec![]).int(), 3);
    Ok(())
}

#[test]
fn array_loops() -> Result<(), Error> {
    let mut sums = class("demo/Sums");
    sums.method(name("positive"), descriptor("([I)I"))
        .access(public_static())
        .body(|b| {
            let zero = b.const_int(0);
            let total = b.local(zero)?;
            let array = b.param(0)?;
            b.for_each_array(array, |b, element| {
                let this_loop = b.scope_id();
                let zero = b.const_int(0);
                let negative = b.lt(element, zero)?;
                b.if_(negative, |b| b.continue_(this_loop))?;
                let current = b.get(total)?;
                let sum = b.add(current, element)?;
                b.set(total, sum)
            })?;
            let total = b.get(total)?;
            b.return_value(total)
        })?;

    let listing = assemble(sums)?;
    let mut machine = Machine::new(&listing);
    let array = machine.int_array(&[3, -4, 5, -1, 10]);
    assert_eq!(machine.call("demo/Sums", "positive", vec![array]).int(), 18);
    let empty = machine.int_array(&[]);
    assert_eq!(machine.call("demo/Sums", "positive", vec![empty]).int(), 0);
    Ok(())
}

#[test]
fn while_loops_over_longs() -> Result<(), Error> {
    let mut math = class("demo/Math");
    math.method(name("factorial"), descriptor("(I)J"))
        .access(public_static())
        .body(|b| {
            let one = b.const_long(1);
            let result = b.local(one)?;
            let n = b.param(0)?;
            let i = b.local(n)?;
            b.while_(
                |b| {
                    let current = b.get(i)?;
                    let zero = b.const_int(0);
                    b.gt(current, zero)
                },
                |b| {
                    let so_far = b.get(result)?;
                    let current = b.get(i)?;
                    let current = b.convert(current, BaseType::Long)?;
                    let product = b.mul(so_far, current)?;
                    b.set(result, product)?;
                    b.inc(i, -1)
                },
            )?;
            let result = b.get(result)?;
            b.return_value(result)
        })?;

    let listing = assemble(math)?;
    let factorial = listing.classes[0].method("factorial").unwrap();
    // parameter, long accumulator, loop counter, then two slotted longs: the accumulator
    // snapshot and the converted counter, which is the second operand of `mul`
    assert_eq!(factorial.max_locals, 8);

    let mut machine = Machine::new(&listing);
    assert_eq!(
        machine.call("demo/Math", "factorial", vec![Val::Int(20)]).long(),
        2432902008176640000
    );
    assert_eq!(machine.call("demo/Math", "factorial", vec![Val::Int(0)]).long(), 1);
    Ok(())
}

#[test]
fn breaking_out_of_nested_scopes() -> Result<(), Error> {
    let mut counter = class("demo/Count");
    counter
        .method(name("up_to"), descriptor("(I)I"))
        .access(public_static())
        .body(|b| {
            let zero = b.const_int(0);
            let i = b.local(zero)?;
            b.loop_(|b| {
                let outer = b.scope_id();
                b.block(|b| {
                    let current = b.get(i)?;
                    let limit = b.param(0)?;
                    let done = b.ge(current, limit)?;
                    b.if_(done, |b| b.break_(outer))?;
                    b.inc(i, 1)
                })
            })?;
            let i = b.get(i)?;
            b.return_value(i)
        })?;

    let listing = assemble(counter)?;
    let mut machine = Machine::new(&listing);
    assert_eq!(machine.call("demo/Count", "up_to", vec![Val::Int(7)]).int(), 7);
    assert_eq!(machine.call("demo/Count", "up_to", vec![Val::Int(-2)]).int(), 0);
    Ok(())
}

#[test]
fn two_armed_branches() -> Result<(), Error> {
    let mut math = class("demo/Max");
    math.method(name("max"), descriptor("(II)I"))
        .access(public_static())
        .body(|b| {
            let x = b.param(0)?;
            let y = b.param(1)?;
            let x_wins = b.gt(x, y)?;
            b.if_else(x_wins, |b| b.return_value(x), |b| b.return_value(y))
        })?;

    let listing = assemble(math)?;
    let mut machine = Machine::new(&listing);
    assert_eq!(machine.call("demo/Max", "max", vec![Val::Int(3), Val::Int(9)]).int(), 9);
    assert_eq!(machine.call("demo/Max", "max", vec![Val::Int(4), Val::Int(-1)]).int(), 4);
    Ok(())
}

#[test]
fn boxing_and_iterables() -> Result<(), Error> {
    let mut boxes = class("demo/Boxes");
    boxes
        .method(name("boxed"), descriptor("(I)Ljava/lang/Integer;"))
        .access(public_static())
        .body(|b| {
            let value = b.param(0)?;
            b.return_value(value)
        })?;
    boxes
        .method(name("total"), descriptor("(Ljava/lang/Iterable;)I"))
        .access(public_static())
        .body(|b| {
            let zero = b.const_int(0);
            let total = b.local(zero)?;
            let items = b.param(0)?;
            b.for_each_iterable(items, |b, item| {
                let item = b.cast(item, FieldType::object(BinaryName::INTEGER))?;
                let current = b.get(total)?;
                let sum = b.add(current, item)?;
                b.set(total, sum)
            })?;
            let total = b.get(total)?;
            b.return_value(total)
        })?;

    let listing = assemble(boxes)?;
    let mut machine = Machine::new(&listing);
    let boxed = machine.call("demo/Boxes", "boxed", vec![Val::Int(5)]).value();
    assert!(matches!(machine.object(&boxed), Object::Boxed(Val::Int(5))));

    let items = (1..=4).map(|i| machine.boxed_int(i)).collect();
    let items = machine.list(items);
    assert_eq!(machine.call("demo/Boxes", "total", vec![items]).int(), 10);
    Ok(())
}

#[test]
fn constructors_and_fields() -> Result<(), Error> {
    let mut counter = class("demo/Counter");
    let count = counter.field(name("count"), FieldType::int(), FieldAccessFlags::PRIVATE)?;
    counter.constructor(vec![FieldType::int()]).body(|b| {
        let this = b.this()?;
        let start = b.param(0)?;
        b.put_field(&count, this, start)
    })?;
    counter
        .method(name("next"), descriptor("()I"))
        .body(|b| {
            let this = b.this()?;
            let current = b.get_field(&count, this)?;
            let one = b.const_int(1);
            let next = b.add(current, one)?;
            b.put_field(&count, this, next)?;
            b.return_value(next)
        })?;

    let listing = assemble(counter)?;
    let init = listing.classes[0].method("<init>").unwrap();
    let mut code = init.instructions();
    assert_eq!(
        code.next(),
        Some(&CodeEntry::Instruction(Instruction::ALoad(0)))
    );
    assert_eq!(
        code.next(),
        Some(&CodeEntry::Instruction(Instruction::Invoke(
            InvokeType::Special,
            MethodRef::object_init()
        )))
    );

    let mut machine = Machine::new(&listing);
    let instance = machine.construct("demo/Counter", vec![Val::Int(41)]).value();
    assert_eq!(machine.call("demo/Counter", "next", vec![instance.clone()]).int(), 42);
    assert_eq!(machine.call("demo/Counter", "next", vec![instance]).int(), 43);
    Ok(())
}

#[test]
fn calls_between_methods() -> Result<(), Error> {
    let mut math = class("demo/Calls");
    let add = math
        .method(name("add"), descriptor("(II)I"))
        .access(public_static())
        .body(|b| {
            let x = b.param(0)?;
            let y = b.param(1)?;
            let sum = b.add(x, y)?;
            b.return_value(sum)
        })?;
    math.method(name("twice"), descriptor("(I)I"))
        .access(public_static())
        .body(|b| {
            let x = b.param(0)?;
            let sum = b.invoke_static(&add, &[x, x])?.expect("add returns a value");
            b.return_value(sum)
        })?;

    let listing = assemble(math)?;
    let mut machine = Machine::new(&listing);
    assert_eq!(machine.call("demo/Calls", "twice", vec![Val::Int(21)]).int(), 42);
    assert_eq!(machine.calls, vec!["demo/Calls.twice", "demo/Calls.add"]);
    Ok(())
}

#[test]
fn static_initializers() -> Result<(), Error> {
    let mut holder = class("demo/Holder");
    let greeting = holder.field(
        name("GREETING"),
        FieldType::string(),
        FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
    )?;
    holder.static_initializer().body(|b| {
        let hello = b.const_string("hello");
        b.put_static(&greeting, hello)
    })?;

    let listing = assemble(holder)?;
    let clinit = listing.classes[0].method("<clinit>").unwrap();
    assert!(clinit.header.access_flags.contains(MethodAccessFlags::STATIC));

    let mut machine = Machine::new(&listing);
    machine.call("demo/Holder", "<clinit>", vec![]);
    let value = machine.static_field("demo/Holder", "GREETING").unwrap();
    assert_eq!(machine.text(&value).as_deref(), Some("hello"));
    Ok(())
}
