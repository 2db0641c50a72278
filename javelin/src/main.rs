use clap::Parser;
use std::process;

use javelin::{
    CallSite, ClassBuilder, ClassDef, Const, Instr, MethodDef, MethodSig, SwitchTable, Ty, Value,
    Vm, VmCreateInfo, terminal_report,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Demo program to run: fib, grade, or crash
    #[arg(default_value = "fib")]
    demo: String,

    /// Argument passed to the demo's entry method
    #[arg(short, long, default_value_t = 10)]
    n: i32,

    /// Interpreter call depth limit
    #[arg(long, default_value_t = javelin::MAX_CALL_DEPTH)]
    max_depth: usize,
}

/// Recursive fibonacci, exercising static invocation and branching.
fn fib_class() -> ClassDef {
    let self_call = || {
        CallSite::new(
            "Fib",
            MethodSig::new("fib", vec![Ty::Int], Some(Ty::Int)),
        )
    };
    ClassBuilder::new("Fib")
        .method(
            MethodDef::new_static("fib", vec![Ty::Int], Some(Ty::Int))
                .max_stack(3)
                .instrs(vec![
                    Instr::Load(0),
                    Instr::Push(Const::Int(2)),
                    Instr::IfICmpGe(5),
                    Instr::Load(0),
                    Instr::ReturnValue,
                    // fib(n - 1) + fib(n - 2)
                    Instr::Load(0),
                    Instr::Push(Const::Int(1)),
                    Instr::ISub,
                    Instr::InvokeStatic(self_call()),
                    Instr::Load(0),
                    Instr::Push(Const::Int(2)),
                    Instr::ISub,
                    Instr::InvokeStatic(self_call()),
                    Instr::IAdd,
                    Instr::ReturnValue,
                ]),
        )
        .build()
}

/// Score banding over a sparse switch table.
fn grade_class() -> ClassDef {
    ClassBuilder::new("Grades")
        .method(
            MethodDef::new_static("grade", vec![Ty::Int], Some(Ty::Int)).instrs(vec![
                Instr::Load(0),
                Instr::Switch(SwitchTable::lookup(
                    vec![(60, 4), (70, 6), (80, 8), (90, 10)],
                    2,
                )),
                Instr::Push(Const::Int(0)),
                Instr::ReturnValue,
                Instr::Push(Const::Int(1)),
                Instr::ReturnValue,
                Instr::Push(Const::Int(2)),
                Instr::ReturnValue,
                Instr::Push(Const::Int(3)),
                Instr::ReturnValue,
                Instr::Push(Const::Int(4)),
                Instr::ReturnValue,
            ]),
        )
        .build()
}

/// Divides by zero inside a callee so the terminal report shows a trace.
fn crash_classes() -> Vec<ClassDef> {
    vec![
        ClassBuilder::new("Deep")
            .method(
                MethodDef::new_static("boom", vec![Ty::Int], Some(Ty::Int))
                    .line(0, 3)
                    .instrs(vec![
                        Instr::Push(Const::Int(100)),
                        Instr::Load(0),
                        Instr::IDiv,
                        Instr::ReturnValue,
                    ]),
            )
            .build(),
        ClassBuilder::new("Crash")
            .method(
                MethodDef::new_static("run", vec![Ty::Int], Some(Ty::Int))
                    .line(0, 7)
                    .instrs(vec![
                        Instr::Load(0),
                        Instr::InvokeStatic(CallSite::new(
                            "Deep",
                            MethodSig::new("boom", vec![Ty::Int], Some(Ty::Int)),
                        )),
                        Instr::ReturnValue,
                    ]),
            )
            .build(),
    ]
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let (classes, entry_class, entry_method) = match cli.demo.as_str() {
        "fib" => (vec![fib_class()], "Fib", "fib"),
        "grade" => (vec![grade_class()], "Grades", "grade"),
        "crash" => (crash_classes(), "Crash", "run"),
        other => {
            eprintln!("unknown demo '{other}' (expected fib, grade, or crash)");
            process::exit(2);
        }
    };

    let vm = Vm::new(VmCreateInfo::with_classes(classes).max_call_depth(cli.max_depth));

    match vm.invoke_entry(entry_class, entry_method, vec![Value::Int(cli.n)]) {
        Ok(Some(value)) => println!("{entry_class}.{entry_method}({}) = {value}", cli.n),
        Ok(None) => println!("{entry_class}.{entry_method}({}) returned", cli.n),
        Err(err) => {
            eprintln!("{}", terminal_report(&err));
            process::exit(1);
        }
    }
}
