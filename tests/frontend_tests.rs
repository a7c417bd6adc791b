//! Reference front-ends: parsing, canonicalization and the errors they report.

use aotc::core::{Error, ErrorKind, Literal, PrimitiveType, Shape};
use aotc::program::{
    GraphComputation, GraphInstruction, GraphModule, GraphOpcode, GraphProgram, GraphShape, ModuleContext, NodeOp,
    Program, UnaryOp,
};

#[test]
fn test_graph_program_with_signature() {
    let text = r#"
HloModule add_module, entry_computation_layout={(f32[2]{0}, f32[2]{0})->f32[2]{0}}

%helper (p: f32[]) -> f32[] {
  ROOT %p = f32[] parameter(0)
}

ENTRY %main (a: f32[2], b: f32[2]) -> f32[2] {
  %a = f32[2]{0} parameter(0)
  %b = f32[2]{0} parameter(1)
  ROOT %sum = f32[2]{0} add(f32[2]{0} %a, f32[2]{0} %b), metadata={op_name="add"}
}
"#;
    let program = GraphProgram::parse(text).unwrap();
    assert_eq!(program.name(), "add_module");
    assert_eq!(program.entry().name, "main");

    let computation = program.to_computation().unwrap();
    assert_eq!(computation.parameters().len(), 2);
    assert_eq!(computation.output_shapes(), vec![Shape::new(PrimitiveType::F32, vec![2])]);
}

#[test]
fn test_graph_canonical_form() {
    let text = "HloModule m\n\nENTRY m() -> s32[] {\n  a = s32[] constant(2)\n  b = s32[] constant(5)\n  unused = s32[] negate(a)\n  ROOT c = s32[] maximum(a, b)\n}";
    let computation = GraphProgram::parse(text).unwrap().to_computation().unwrap();
    assert_eq!(computation.nodes().len(), 4);
    assert_eq!(computation.outputs(), &[3]);
    match computation.node(0).op() {
        NodeOp::Constant(literal) => assert_eq!(literal, &Literal::scalar(2i32)),
        other => panic!("unexpected node {:?}", other),
    }
}

#[test]
fn test_graph_shape_mismatch_is_lowering_error() {
    let text = "HloModule m\n\nENTRY m() -> s32[2] {\n  a = s32[2] constant({1, 2})\n  b = s32[3] constant({1, 2, 3})\n  ROOT c = s32[2] add(a, b)\n}";
    let program = GraphProgram::parse(text).unwrap();
    let err = Program::Graph(&program).to_computation().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
}

#[test]
fn test_graph_nested_tuple_rejected() {
    let text = "HloModule m\n\nENTRY m() -> (s32[], s32[]) {\n  a = s32[] constant(1)\n  t = (s32[], s32[]) tuple(a, a)\n  ROOT r = (s32[], s32[]) tuple(a, a)\n}";
    let program = GraphProgram::parse(text).unwrap();
    let err = program.to_computation().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
}

#[test]
fn test_graph_parse_error_position() {
    let text = "HloModule m\n\nENTRY m() -> s32[] {\n  ROOT c = s32[] iota()\n}";
    match GraphProgram::parse(text).unwrap_err() {
        Error::Parse { line, message, .. } => {
            assert_eq!(line, 4);
            assert!(message.contains("iota"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_graph_display_reparses() {
    let text = "HloModule m\n\nENTRY m(x: s64[2]) -> s64[2] {\n  x = s64[2] parameter(0)\n  c = s64[2] constant({3, 4})\n  ROOT p = s64[2] multiply(x, c)\n}";
    let program = GraphProgram::parse(text).unwrap();
    let reparsed = GraphProgram::parse(&program.to_string()).unwrap();
    assert_eq!(reparsed, program);
}

fn hand_built(instructions: Vec<GraphInstruction>, root: usize) -> GraphProgram {
    GraphProgram::from_module(GraphModule {
        name: "hand_built".to_string(),
        entry: GraphComputation {
            name: "main".to_string(),
            signature: None,
            result_shape: None,
            instructions,
            root,
        },
    })
}

#[test]
fn test_graph_hand_built_module_errors() {
    let scalar = GraphShape::Array(Shape::scalar(PrimitiveType::S32));
    let constant = GraphInstruction {
        name: "c".to_string(),
        shape: scalar.clone(),
        opcode: GraphOpcode::Constant(Literal::scalar(1i32)),
        operands: vec![],
    };

    let bad_root = hand_built(vec![constant.clone()], 5);
    assert!(bad_root.entry().root_instruction().is_none());
    let err = bad_root.to_computation().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
    assert!(err.to_string().contains("out of range"));

    let missing_operand = GraphInstruction {
        name: "n".to_string(),
        shape: scalar.clone(),
        opcode: GraphOpcode::Unary(UnaryOp::Negate),
        operands: vec![],
    };
    let program = hand_built(vec![constant.clone(), missing_operand], 1);
    let err = program.to_computation().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
    assert!(err.to_string().contains("missing operand 0"));

    let forward_use = GraphInstruction {
        name: "f".to_string(),
        shape: scalar,
        opcode: GraphOpcode::Unary(UnaryOp::Negate),
        operands: vec![7],
    };
    let program = hand_built(vec![constant, forward_use], 1);
    assert_eq!(program.to_computation().unwrap_err().kind(), ErrorKind::LoweringFailure);
    assert!(program.to_string().contains("negate(<undefined>)"));
}

#[test]
fn test_oversized_shapes_are_parse_errors() {
    let graph = "HloModule m\n\nENTRY e() -> s32[] {\n  ROOT r = s32[4294967296,4294967296] constant(1)\n}";
    assert_eq!(GraphProgram::parse(graph).unwrap_err().kind(), ErrorKind::Parse);

    let truncating = "HloModule m\n\nENTRY e() -> s32[18446744073709551615] {\n  ROOT r = s32[18446744073709551615] constant({})\n}";
    assert_eq!(GraphProgram::parse(truncating).unwrap_err().kind(), ErrorKind::Parse);

    let context = ModuleContext::new();
    let negative = "func.func @main(%a: tensor<-3xi32>) -> tensor<-3xi32> {\n  return %a : tensor<-3xi32>\n}";
    assert_eq!(context.parse_module(negative).unwrap_err().kind(), ErrorKind::Parse);
}

#[test]
fn test_structured_oversized_splat_is_lowering_error() {
    let text = "func.func @main() -> tensor<100000000000xi32> {\n  %0 = mhlo.constant dense<0> : tensor<100000000000xi32>\n  return %0 : tensor<100000000000xi32>\n}";
    let context = ModuleContext::new();
    let module = context.parse_module(text).unwrap();
    let err = module.to_computation().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
    assert!(err.to_string().contains("too large"));
}

#[test]
fn test_structured_module_lowering() {
    let text = r#"
module @jit_f {
  func.func private @helper(%x: tensor<f32>) -> tensor<f32> {
    return %x : tensor<f32>
  }
  func.func public @main(%p: tensor<2xi1>, %q: tensor<2xi1>) -> tensor<2xi1> {
    %0 = stablehlo.and %p, %q : tensor<2xi1>
    %1 = stablehlo.not %0 : tensor<2xi1>
    func.return %1 : tensor<2xi1>
  }
}"#;
    let context = ModuleContext::new();
    let module = context.parse_module(text).unwrap();
    assert_eq!(module.name(), Some("jit_f"));
    assert_eq!(module.functions().len(), 2);
    assert_eq!(module.entry_function().unwrap().name, "main");

    let computation = module.to_computation().unwrap();
    assert_eq!(computation.parameter_shapes(), vec![Shape::new(PrimitiveType::Pred, vec![2]); 2]);
    assert!(context.allocated_bytes() > 0);
}

#[test]
fn test_structured_type_errors() {
    let context = ModuleContext::new();

    let arithmetic_on_pred = "func.func @main(%a: tensor<i1>) -> tensor<i1> {\n  %0 = mhlo.add %a, %a : tensor<i1>\n  return %0 : tensor<i1>\n}";
    let module = context.parse_module(arithmetic_on_pred).unwrap();
    assert_eq!(module.to_computation().unwrap_err().kind(), ErrorKind::LoweringFailure);

    let wrong_result = "func.func @main() -> tensor<i64> {\n  %0 = mhlo.constant dense<1> : tensor<i32>\n  return %0 : tensor<i32>\n}";
    let module = context.parse_module(wrong_result).unwrap();
    assert_eq!(module.to_computation().unwrap_err().kind(), ErrorKind::LoweringFailure);

    let no_main = "func.func @a() -> tensor<i32> {\n  %0 = mhlo.constant dense<1> : tensor<i32>\n  return %0 : tensor<i32>\n}\nfunc.func @b() -> tensor<i32> {\n  %0 = mhlo.constant dense<1> : tensor<i32>\n  return %0 : tensor<i32>\n}";
    let module = context.parse_module(no_main).unwrap();
    assert_eq!(module.entry_function().unwrap_err().kind(), ErrorKind::LoweringFailure);
}

#[test]
fn test_structured_display_reparses() {
    let text = "module @m {\n  func.func @main(%a: tensor<2xf64>) -> tensor<2xf64> {\n    %c = mhlo.constant dense<[1.5, -2.0]> : tensor<2xf64>\n    %s = mhlo.multiply %a, %c : tensor<2xf64>\n    return %s : tensor<2xf64>\n  }\n}";
    let context = ModuleContext::new();
    let module = context.parse_module(text).unwrap();
    let printed = module.to_string();
    let reparsed = context.parse_module(&printed).unwrap();
    assert_eq!(reparsed.to_computation().unwrap(), module.to_computation().unwrap());
    assert_eq!(context.modules_parsed(), 2);
}
