//! JavaScript lifter.
//!
//! Every variable is named `v{N}`. Variables that are the target of a
//! reassignment are declared with `let`, all others with `const`. Guarded
//! operations are wrapped in `try`/`catch` so a thrown exception leaves the
//! output `undefined` instead of ending the script. Catches around calls of
//! Wasm exports report traps through the engine's `output` function, and
//! failed instantiations are reported the same way.

use crate::literal;
use crate::wasm::{encode_modules, import_name, EncodedModule};
use crate::writer::ScriptWriter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use wasp_core::{Error, LiftingOptions, Result};
use wasp_ir::{check_arity, Environment, Instruction, Operation, Program, Variable};

pub struct JavaScriptLifter {
    options: LiftingOptions,
    environment: Arc<Environment>,
}

impl JavaScriptLifter {
    pub fn new(options: LiftingOptions) -> Self {
        Self::with_environment(options, Arc::new(Environment::javascript()))
    }

    /// Lifter typing builtins against a session's environment
    pub fn with_environment(options: LiftingOptions, environment: Arc<Environment>) -> Self {
        Self { options, environment }
    }

    /// Lift a program to a script. Equal programs lift to equal text.
    pub fn lift(&self, program: &Program) -> Result<String> {
        for inst in program.iter() {
            check_arity(inst)?;
        }

        let modules = encode_modules(program, &self.environment)?
            .into_iter()
            .map(|module| (module.end, module))
            .collect();
        let reassigned = program
            .iter()
            .filter(|inst| inst.operation == Operation::Reassign)
            .filter_map(|inst| inst.input(0))
            .collect();
        let wasm_functions = program
            .iter()
            .filter(|inst| matches!(inst.operation, Operation::GetWasmExport { .. }))
            .filter_map(|inst| inst.output())
            .collect();

        let mut script = Script {
            writer: ScriptWriter::new(),
            reassigned,
            wasm_functions,
            modules,
        };
        let mut in_module = false;

        for (idx, inst) in program.iter().enumerate() {
            if self.options.include_comments {
                script.writer.emit(&format!("// {}", inst));
            }
            match inst.operation {
                Operation::BeginWasmModule => in_module = true,
                Operation::EndWasmModule => {
                    in_module = false;
                    script.module(idx, inst)?;
                }
                // Module bodies are part of the encoded module
                _ if in_module => {}
                _ => script.instruction(inst)?,
            }
        }

        debug!("Lifted program of {} instructions", program.len());
        Ok(script.writer.finish())
    }
}

struct Script {
    writer: ScriptWriter,
    reassigned: HashSet<Variable>,
    /// Variables holding functions read from an exports object
    wasm_functions: HashSet<Variable>,
    modules: HashMap<usize, EncodedModule>,
}

/// What the `catch` of a guarded operation does with the exception
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Ignore,
    ReportTrap,
    ReportInstantiation,
}

impl Handler {
    fn clause(self) -> &'static str {
        match self {
            Handler::Ignore => "catch (e) {}",
            Handler::ReportTrap => {
                r#"catch (e) { if (e instanceof WebAssembly.RuntimeError) output("trap: " + e.message); }"#
            }
            Handler::ReportInstantiation => r#"catch (e) { output("instantiation failed: " + e.message); }"#,
        }
    }
}

fn args(inputs: &[Variable]) -> String {
    inputs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

/// `object?.name`; exports objects are undefined after a failed instantiation
fn optional_member(object: Variable, name: &str) -> Result<String> {
    if literal::is_identifier(name) {
        Ok(format!("{}?.{}", object, name))
    } else {
        Ok(format!("{}?.[{}]", object, literal::string(name)?))
    }
}

fn import_object(sources: &[Variable]) -> String {
    if sources.is_empty() {
        return "{}".to_string();
    }
    let fields: Vec<String> = sources
        .iter()
        .enumerate()
        .map(|(i, source)| format!("{}: {}", import_name(i), source))
        .collect();
    format!("{{ imports: {{ {} }} }}", fields.join(", "))
}

impl Script {
    fn keyword(&self, var: Variable) -> &'static str {
        if self.reassigned.contains(&var) {
            "let"
        } else {
            "const"
        }
    }

    fn define(&mut self, var: Variable, expression: &str) {
        let line = format!("{} {} = {};", self.keyword(var), var, expression);
        self.writer.emit(&line);
    }

    fn define_output(&mut self, inst: &Instruction, expression: &str) -> Result<()> {
        let output = inst
            .output()
            .ok_or_else(|| Error::Lifting(format!("{} has no output", inst.operation.name())))?;
        self.define(output, expression);
        Ok(())
    }

    fn guarded(&mut self, output: Option<Variable>, expression: &str, handler: Handler) {
        match output {
            Some(output) => {
                self.writer.emit(&format!("let {};", output));
                self.writer
                    .emit(&format!("try {{ {} = {}; }} {}", output, expression, handler.clause()));
            }
            None => self
                .writer
                .emit(&format!("try {{ {}; }} {}", expression, handler.clause())),
        }
    }

    /// A call that is guarded when the operation says so
    fn call(&mut self, inst: &Instruction, expression: &str, handler: Handler) -> Result<()> {
        if inst.operation.is_guarded() {
            self.guarded(inst.output(), expression, handler);
            Ok(())
        } else {
            self.define_output(inst, expression)
        }
    }

    fn module(&mut self, idx: usize, inst: &Instruction) -> Result<()> {
        let module = self
            .modules
            .remove(&idx)
            .ok_or_else(|| Error::Lifting(format!("no encoded module ends at {}", idx)))?;
        let (compiled, exports) = match inst.outputs.as_slice() {
            [compiled, exports] => (*compiled, *exports),
            _ => return Err(Error::Lifting("module end must define two outputs".to_string())),
        };
        self.define(
            compiled,
            &format!(
                "new WebAssembly.Module(new Uint8Array({}))",
                literal::byte_array(&module.bytes)
            ),
        );
        let instance = format!(
            "new WebAssembly.Instance({}, {}).exports",
            compiled,
            import_object(&module.import_sources)
        );
        self.guarded(Some(exports), &instance, Handler::ReportInstantiation);
        Ok(())
    }

    fn instruction(&mut self, inst: &Instruction) -> Result<()> {
        use Operation::*;
        let input = |i: usize| inst.inputs[i];

        match &inst.operation {
            LoadInteger { value } => self.define_output(inst, &literal::integer(*value))?,
            LoadBigInt { value } => self.define_output(inst, &literal::bigint(*value))?,
            LoadFloat { value } => self.define_output(inst, &literal::float(*value))?,
            LoadString { value } => self.define_output(inst, &literal::string(value)?)?,
            LoadBoolean { value } => self.define_output(inst, if *value { "true" } else { "false" })?,
            LoadUndefined => self.define_output(inst, "undefined")?,
            LoadNull => self.define_output(inst, "null")?,
            LoadRegExp { pattern, flags } => self.define_output(inst, &literal::regexp(pattern, flags))?,
            LoadBuiltin { name } => self.define_output(inst, name)?,
            CreateObject { property_names } => {
                let mut fields = Vec::with_capacity(property_names.len());
                for (name, value) in property_names.iter().zip(&inst.inputs) {
                    fields.push(format!("{}: {}", literal::property_key(name)?, value));
                }
                let expression = if fields.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", fields.join(", "))
                };
                self.define_output(inst, &expression)?;
            }
            CreateArray { .. } => self.define_output(inst, &format!("[{}]", args(&inst.inputs)))?,

            GetProperty { name } => {
                let expression = literal::member(&input(0).to_string(), name)?;
                self.define_output(inst, &expression)?;
            }
            SetProperty { name } => {
                let target = literal::member(&input(0).to_string(), name)?;
                self.writer.emit(&format!("{} = {};", target, input(1)));
            }
            DeleteProperty { name } => {
                let target = literal::member(&input(0).to_string(), name)?;
                self.define_output(inst, &format!("delete {}", target))?;
            }
            GetElement { index } => self.define_output(inst, &format!("{}[{}]", input(0), index))?,
            SetElement { index } => {
                self.writer
                    .emit(&format!("{}[{}] = {};", input(0), index, input(1)));
            }
            GetComputedProperty => self.define_output(inst, &format!("{}[{}]", input(0), input(1)))?,
            SetComputedProperty => {
                self.writer
                    .emit(&format!("{}[{}] = {};", input(0), input(1), input(2)));
            }

            CallFunction { .. } => {
                let expression = format!("{}({})", input(0), args(&inst.inputs[1..]));
                let handler = if self.wasm_functions.contains(&input(0)) {
                    Handler::ReportTrap
                } else {
                    Handler::Ignore
                };
                self.call(inst, &expression, handler)?;
            }
            CallMethod { method, .. } => {
                let callee = literal::member(&input(0).to_string(), method)?;
                let expression = format!("{}({})", callee, args(&inst.inputs[1..]));
                self.call(inst, &expression, Handler::Ignore)?;
            }
            Construct { .. } => {
                let expression = format!("new {}({})", input(0), args(&inst.inputs[1..]));
                self.call(inst, &expression, Handler::Ignore)?;
            }
            BinaryOperation { op } => {
                self.define_output(inst, &format!("{} {} {}", input(0), op.token(), input(1)))?;
            }
            UnaryOperation { op } => self.define_output(inst, &format!("{}{}", op.token(), input(0)))?,
            Compare { op } => {
                self.define_output(inst, &format!("{} {} {}", input(0), op.token(), input(1)))?;
            }
            Reassign => self.writer.emit(&format!("{} = {};", input(0), input(1))),

            BeginPlainFunction { .. } => {
                let function = inst
                    .output()
                    .ok_or_else(|| Error::Lifting("function definition has no output".to_string()))?;
                self.writer
                    .open(&format!("function {}({}) {{", function, args(&inst.inner_outputs)));
            }
            EndPlainFunction | EndIf | EndRepeatLoop | EndTryCatch => self.writer.close("}"),
            Return { has_value: true } => self.writer.emit(&format!("return {};", input(0))),
            Return { has_value: false } => self.writer.emit("return;"),
            BeginIf => self.writer.open(&format!("if ({}) {{", input(0))),
            BeginElse => self.writer.reopen("} else {"),
            BeginRepeatLoop { iterations } => {
                let counter = inst
                    .inner_outputs
                    .first()
                    .copied()
                    .ok_or_else(|| Error::Lifting("loop has no counter".to_string()))?;
                let index = format!("i{}", counter.number());
                self.writer.open(&format!(
                    "for (let {i} = 0; {i} < {n}; {i}++) {{",
                    i = index,
                    n = iterations
                ));
                self.define(counter, &index);
            }
            LoopBreak => self.writer.emit("break;"),
            LoopContinue => self.writer.emit("continue;"),
            BeginTry => self.writer.open("try {"),
            BeginCatch => {
                let exception = inst
                    .inner_outputs
                    .first()
                    .copied()
                    .ok_or_else(|| Error::Lifting("catch has no exception variable".to_string()))?;
                self.writer.reopen(&format!("}} catch ({}) {{", exception));
            }
            ThrowException => self.writer.emit(&format!("throw {};", input(0))),

            CreateWasmGlobal { value, mutable } => {
                let expression = format!(
                    "new WebAssembly.Global({{ value: \"{}\", mutable: {} }}, {})",
                    value.value_type().js_api_name(),
                    mutable,
                    literal::wasm_value(value)
                );
                self.define_output(inst, &expression)?;
            }
            CreateWasmMemory { minimum, maximum, shared } => {
                let mut fields = vec![format!("initial: {}", minimum)];
                if let Some(maximum) = maximum {
                    fields.push(format!("maximum: {}", maximum));
                }
                if *shared {
                    fields.push("shared: true".to_string());
                }
                let expression = format!("new WebAssembly.Memory({{ {} }})", fields.join(", "));
                self.define_output(inst, &expression)?;
            }
            CreateWasmTable { element, minimum, maximum } => {
                let mut fields = vec![
                    format!("element: \"{}\"", element.js_api_name()),
                    format!("initial: {}", minimum),
                ];
                if let Some(maximum) = maximum {
                    fields.push(format!("maximum: {}", maximum));
                }
                let expression = format!("new WebAssembly.Table({{ {} }})", fields.join(", "));
                self.define_output(inst, &expression)?;
            }
            InstantiateWasm { .. } => {
                let expression = format!(
                    "new WebAssembly.Instance({}, {}).exports",
                    input(0),
                    import_object(&inst.inputs[1..])
                );
                self.guarded(inst.output(), &expression, Handler::ReportInstantiation);
            }
            GetWasmExport { export_name } => {
                let expression = optional_member(input(0), export_name)?;
                self.define_output(inst, &expression)?;
            }
            GetWasmMemory { memory_index } => {
                let expression = optional_member(input(0), &format!("memory{}", memory_index))?;
                self.define_output(inst, &expression)?;
            }
            WriteWasmMemory { offset, bytes } => {
                let statement = format!(
                    "new Uint8Array({}.buffer).set({}, {})",
                    input(0),
                    literal::byte_array(bytes),
                    offset
                );
                self.guarded(None, &statement, Handler::Ignore);
            }
            GetWasmGlobal { global_name } => {
                let expression = format!("{}?.value", optional_member(input(0), global_name)?);
                self.define_output(inst, &expression)?;
            }

            BeginWasmModule | EndWasmModule => {
                return Err(Error::Lifting("module boundaries are lifted separately".to_string()))
            }
            WasmDefineGlobal { .. } | WasmImportGlobal | WasmDefineTable { .. } | WasmImportTable
            | WasmDefineMemory { .. } | WasmImportMemory | WasmImportFunction { .. }
            | BeginWasmFunction { .. } | EndWasmFunction { .. } | WasmConst { .. }
            | WasmIntBinary { .. } | WasmIntUnary { .. } | WasmIntEqz { .. }
            | WasmIntCompare { .. } | WasmFloatBinary { .. } | WasmFloatUnary { .. }
            | WasmFloatCompare { .. } | WasmLoadGlobal | WasmStoreGlobal | WasmTableGet
            | WasmTableSet | WasmMemoryLoad { .. } | WasmMemoryStore { .. }
            | WasmCallFunction { .. } | WasmReassign | WasmReturn { .. } | WasmBeginBlock
            | WasmEndBlock | WasmBeginLoop | WasmEndLoop | WasmBeginIf | WasmBeginElse
            | WasmEndIf | WasmBranch | WasmBranchIf | WasmUnreachable => {
                return Err(Error::Lifting(format!(
                    "{} outside of a Wasm module",
                    inst.operation.name()
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use wasp_core::FuzzConfig;
    use wasp_gen::{FuzzContext, ProgramBuilder};
    use wasp_ir::{BinaryOperator, IntBinaryOp, NumWidth, WasmLiteral, WasmSignature, WasmValueType};

    fn builder(seed: u64) -> ProgramBuilder {
        ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), seed)
    }

    fn lift(program: &Program) -> String {
        JavaScriptLifter::new(LiftingOptions::default()).lift(program).unwrap()
    }

    #[test]
    fn test_straight_line_code() {
        let mut b = builder(1);
        let x = b.load_integer(1);
        let y = b.load_integer(2);
        b.binary(x, y, BinaryOperator::Add);
        let program = b.finalize().unwrap();
        assert_eq!(lift(&program), "const v0 = 1;\nconst v1 = 2;\nconst v2 = v0 + v1;\n");
    }

    #[test]
    fn test_reassigned_variables_use_let() {
        let mut b = builder(1);
        let x = b.load_integer(1);
        let y = b.load_integer(2);
        b.reassign(x, y);
        let program = b.finalize().unwrap();
        assert_eq!(lift(&program), "let v0 = 1;\nconst v1 = 2;\nv0 = v1;\n");
    }

    #[test]
    fn test_guarded_call() {
        let mut b = builder(1);
        let f = b.load_builtin("Object");
        b.call_function(f, vec![], true);
        let program = b.finalize().unwrap();
        assert_eq!(
            lift(&program),
            "const v0 = Object;\nlet v1;\ntry { v1 = v0(); } catch (e) {}\n"
        );
    }

    #[test]
    fn test_blocks_are_indented() {
        let mut b = builder(1);
        b.build_repeat_loop(5, |b, i| {
            b.build_if(i, |b| {
                b.load_float(-0.0);
            });
        });
        let program = b.finalize().unwrap();
        assert_eq!(
            lift(&program),
            "for (let i0 = 0; i0 < 5; i0++) {\n    const v0 = i0;\n    if (v0) {\n        const v1 = -0;\n    }\n}\n"
        );
    }

    #[test]
    fn test_wasm_objects_from_javascript() {
        let mut b = builder(1);
        b.create_wasm_global(wasp_ir::WasmLiteral::I64(5), true);
        b.create_wasm_memory(1, Some(4), true);
        b.create_wasm_table(WasmValueType::FuncRef, 2, None);
        let program = b.finalize().unwrap();
        let script = lift(&program);
        assert!(script.contains(r#"new WebAssembly.Global({ value: "i64", mutable: true }, 5n)"#));
        assert!(script.contains("new WebAssembly.Memory({ initial: 1, maximum: 4, shared: true })"));
        assert!(script.contains(r#"new WebAssembly.Table({ element: "anyfunc", initial: 2 })"#));
    }

    #[test]
    fn test_module_is_embedded() {
        let mut b = builder(1);
        let memory = b.create_wasm_memory(1, None, false);
        let (_, exports) = b.build_wasm_module(|b| {
            b.wasm_import_memory(memory);
            b.build_wasm_function(WasmSignature::new(vec![], vec![WasmValueType::I32]), |b, _| {
                Some(b.wasm_const(wasp_ir::WasmLiteral::I32(42)))
            });
        });
        b.get_wasm_export(exports, "function0");
        let program = b.finalize().unwrap();
        let script = lift(&program);

        assert!(script.contains("new WebAssembly.Module(new Uint8Array([0, 97, 115, 109, 1, 0, 0, 0"));
        assert!(script.contains("new WebAssembly.Instance(v"));
        assert!(script.contains(&format!("{{ imports: {{ import0: {} }} }}).exports;", memory)));
        assert!(script.contains("?.function0;"));
        // Module body instructions have no JavaScript form
        assert!(!script.contains("WasmConst"));
        assert_eq!(script.lines().count(), 5);
    }

    #[test]
    fn test_trapping_export_call_is_reported() {
        let mut b = builder(1);
        let (_, exports) = b.build_wasm_module(|b| {
            b.build_wasm_function(WasmSignature::new(vec![], vec![WasmValueType::I32]), |b, _| {
                let one = b.wasm_const(WasmLiteral::I32(1));
                let zero = b.wasm_const(WasmLiteral::I32(0));
                Some(b.wasm_int_binary(NumWidth::Bits32, IntBinaryOp::DivS, one, zero))
            });
        });
        let function = b.get_wasm_export(exports, "function0");
        let result = b.call_function(function, vec![], true);
        let program = b.finalize().unwrap();
        let script = lift(&program);

        let call = script
            .lines()
            .find(|line| line.contains(&format!("{} = {}()", result, function)))
            .unwrap();
        assert!(call.contains("e instanceof WebAssembly.RuntimeError"));
        assert!(call.contains(r#"output("trap: " + e.message)"#));
        assert!(!script.contains("catch (e) {}"));
    }

    #[test]
    fn test_instantiation_is_guarded_and_reported() {
        let mut b = builder(1);
        let (compiled, exports) = b.build_wasm_module(|b| {
            b.build_wasm_function(WasmSignature::new(vec![], vec![]), |_, _| None);
        });
        let again = b.instantiate_wasm(compiled, vec![]);
        let function = b.get_wasm_export(again, "function0");
        let program = b.finalize().unwrap();
        let script = lift(&program);
        let lines: Vec<&str> = script.lines().collect();

        assert_eq!(lines[1], format!("let {};", exports));
        let instance = format!("try {{ {} = new WebAssembly.Instance({}, {{}}).exports; }}", exports, compiled);
        assert!(lines[2].starts_with(&instance));
        assert!(lines[2].ends_with(r#"catch (e) { output("instantiation failed: " + e.message); }"#));
        assert_eq!(lines[3], format!("let {};", again));
        assert!(lines[4].contains("instantiation failed"));
        assert_eq!(lines[5], format!("const {} = {}?.function0;", function, again));
    }

    #[test]
    fn test_comments_show_the_ir() {
        let mut b = builder(1);
        b.load_integer(42);
        let program = b.finalize().unwrap();
        let lifter = JavaScriptLifter::new(LiftingOptions { include_comments: true });
        assert_eq!(lifter.lift(&program).unwrap(), "// v0 <- LoadInteger '42'\nconst v0 = 42;\n");
    }

    #[test]
    fn test_arity_mismatch_fails() {
        let program = Program::with_instructions(vec![Instruction::new(
            Operation::LoadInteger { value: 1 },
            vec![],
            vec![],
            vec![],
        )]);
        let result = JavaScriptLifter::new(LiftingOptions::default()).lift(&program);
        assert!(matches!(result, Err(Error::Lifting(_))));
    }

    #[test]
    fn test_export_names_are_quoted_when_needed() {
        assert_eq!(optional_member(Variable(3), "global0").unwrap(), "v3?.global0");
        assert_eq!(optional_member(Variable(3), "a b").unwrap(), r#"v3?.["a b"]"#);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_lifting_is_deterministic_and_survives_serialization(seed in 0u64..1000) {
            let mut b = builder(seed);
            b.build_prefix();
            b.build(30);
            let Ok(program) = b.finalize() else {
                return Ok(());
            };

            let restored = Program::from_bytes(&program.to_bytes().unwrap()).unwrap();
            prop_assert_eq!(lift(&program), lift(&program));
            prop_assert_eq!(lift(&restored), lift(&program));
        }
    }
}
