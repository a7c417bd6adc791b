//! Topology gate and compile/load/execute round trip for both program forms.

use aotc::compiler::{Compiler, HostCompiler};
use aotc::core::{
    host_platform_id, CompileOptions, ErrorKind, ExecuteOptions, Literal, LoadOptions, PlatformId, TopologyDescription,
};
use aotc::program::{GraphProgram, ModuleContext, Program, ProgramKind};
use aotc::runtime::{Client, HostClient, HostClientOptions};

const GRAPH_PROGRAM: &str = r#"
HloModule Computation

ENTRY Computation() -> s32[] {
  ROOT result = s32[] constant(2)
}
"#;

const STRUCTURED_PROGRAM: &str = r#"
  module {
    func.func @main() -> tensor<i32> {
      %0 = mhlo.constant dense<2> : tensor<i32>
      return %0 : tensor<i32>
    }
  }"#;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn client() -> HostClient {
    HostClient::new(HostClientOptions::default()).unwrap()
}

fn fake_topology() -> TopologyDescription {
    TopologyDescription::new(host_platform_id(), "host", "Fake_device", [0u32, 1])
}

fn compile_and_run(program: Program<'_>) {
    let client = client();
    let topology = client.topology_description().unwrap();

    let executable = HostCompiler::new()
        .compile(&CompileOptions::default(), program, &topology, Some(&client as &dyn Client))
        .unwrap();
    assert_eq!(executable.topology(), &topology);

    let loaded = client.load(executable, &LoadOptions::default()).unwrap();
    let results = loaded.execute(&[vec![]], &ExecuteOptions::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].len(), 1);

    let literal = results[0][0].to_literal_sync().unwrap();
    assert_eq!(literal, Literal::scalar(2i32));
    assert_eq!(literal.get_first_element::<i32>().unwrap(), 2);
    // Reading back does not consume the buffer.
    assert_eq!(results[0][0].to_literal_sync().unwrap(), literal);
}

#[test]
fn test_graph_no_client() {
    init_logger();
    let program = GraphProgram::parse(GRAPH_PROGRAM).unwrap();
    let topology = client().topology_description().unwrap();

    let err = HostCompiler::new()
        .compile(&CompileOptions::default(), Program::Graph(&program), &topology, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
}

#[test]
fn test_graph_topology_not_same() {
    init_logger();
    let program = GraphProgram::parse(GRAPH_PROGRAM).unwrap();
    let client = client();

    let err = HostCompiler::new()
        .compile(
            &CompileOptions::default(),
            Program::Graph(&program),
            &fake_topology(),
            Some(&client as &dyn Client),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
    assert!(err.to_string().contains("does not match"));
}

#[test]
fn test_graph_success() {
    init_logger();
    let program = GraphProgram::parse(GRAPH_PROGRAM).unwrap();
    compile_and_run(Program::Graph(&program));
}

#[test]
fn test_structured_no_client() {
    init_logger();
    let context = ModuleContext::new();
    let module = context.parse_module(STRUCTURED_PROGRAM).unwrap();
    let topology = client().topology_description().unwrap();

    let err = HostCompiler::new()
        .compile(&CompileOptions::default(), Program::Module(&module), &topology, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
}

#[test]
fn test_structured_topology_not_same() {
    init_logger();
    let context = ModuleContext::new();
    let module = context.parse_module(STRUCTURED_PROGRAM).unwrap();
    let client = client();

    let err = HostCompiler::new()
        .compile(
            &CompileOptions::default(),
            Program::Module(&module),
            &fake_topology(),
            Some(&client as &dyn Client),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
}

#[test]
fn test_structured_success() {
    init_logger();
    let context = ModuleContext::new();
    let module = context.parse_module(STRUCTURED_PROGRAM).unwrap();
    assert_eq!(context.modules_parsed(), 1);
    compile_and_run(Program::Module(&module));
}

#[test]
fn test_both_forms_lower_identically() {
    init_logger();
    let client = client();
    let topology = client.topology_description().unwrap();
    let compiler = HostCompiler::new();

    let graph = GraphProgram::parse(GRAPH_PROGRAM).unwrap();
    let context = ModuleContext::new();
    let module = context.parse_module(STRUCTURED_PROGRAM).unwrap();

    let from_graph = compiler
        .compile(&CompileOptions::default(), Program::Graph(&graph), &topology, Some(&client as &dyn Client))
        .unwrap();
    let from_module = compiler
        .compile(&CompileOptions::default(), Program::Module(&module), &topology, Some(&client as &dyn Client))
        .unwrap();

    assert_eq!(from_graph.program_kind(), ProgramKind::Graph);
    assert_eq!(from_module.program_kind(), ProgramKind::Structured);
    assert_eq!(from_graph.program(), from_module.program());
}

#[test]
fn test_device_kind_does_not_affect_topology_equality() {
    init_logger();
    let program = GraphProgram::parse(GRAPH_PROGRAM).unwrap();
    let client = client();
    let relabeled = TopologyDescription::new(host_platform_id(), "host", "another_kind", [0u32]);

    let executable = HostCompiler::new()
        .compile(
            &CompileOptions::default(),
            Program::Graph(&program),
            &relabeled,
            Some(&client as &dyn Client),
        )
        .unwrap();
    assert_eq!(executable.topology().device_kind(), "another_kind");
}

#[test]
fn test_platform_mismatch_rejected() {
    init_logger();
    let program = GraphProgram::parse(GRAPH_PROGRAM).unwrap();
    let client = client();
    let other_platform = TopologyDescription::new(PlatformId::from_name("tpu"), "tpu", "host_device", [0u32]);

    let err = HostCompiler::new()
        .compile(
            &CompileOptions::default(),
            Program::Graph(&program),
            &other_platform,
            Some(&client as &dyn Client),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
}

#[test]
fn test_lowering_failure_surfaces() {
    init_logger();
    let text = "HloModule bad\n\nENTRY bad() -> pred[] {\n  a = pred[] constant(true)\n  ROOT b = pred[] add(a, a)\n}";
    let program = GraphProgram::parse(text).unwrap();
    let client = client();
    let topology = client.topology_description().unwrap();

    let err = HostCompiler::new()
        .compile(&CompileOptions::default(), Program::Graph(&program), &topology, Some(&client as &dyn Client))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
}

#[test]
fn test_too_many_replicas() {
    init_logger();
    let program = GraphProgram::parse(GRAPH_PROGRAM).unwrap();
    let client = client();
    let topology = client.topology_description().unwrap();

    let err = HostCompiler::new()
        .compile(
            &CompileOptions::new().with_num_replicas(2),
            Program::Graph(&program),
            &topology,
            Some(&client as &dyn Client),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
}

const UNLOWERABLE_GRAPH: &str = "HloModule bad\n\nENTRY bad() -> pred[] {\n  a = pred[] constant(true)\n  ROOT b = pred[] add(a, a)\n}";

const UNLOWERABLE_STRUCTURED: &str =
    "func.func @main() -> tensor<i1> {\n  %0 = mhlo.constant dense<true> : tensor<i1>\n  %1 = mhlo.add %0, %0 : tensor<i1>\n  return %1 : tensor<i1>\n}";

#[test]
fn test_gate_runs_before_lowering_graph() {
    init_logger();
    let program = GraphProgram::parse(UNLOWERABLE_GRAPH).unwrap();
    let client = client();
    let topology = client.topology_description().unwrap();
    let compiler = HostCompiler::new();

    let err = compiler
        .compile(&CompileOptions::default(), Program::Graph(&program), &topology, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);

    let err = compiler
        .compile(
            &CompileOptions::default(),
            Program::Graph(&program),
            &fake_topology(),
            Some(&client as &dyn Client),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
}

#[test]
fn test_gate_runs_before_lowering_structured() {
    init_logger();
    let context = ModuleContext::new();
    let module = context.parse_module(UNLOWERABLE_STRUCTURED).unwrap();
    let client = client();
    let topology = client.topology_description().unwrap();
    let compiler = HostCompiler::new();

    let err = compiler
        .compile(&CompileOptions::default(), Program::Module(&module), &topology, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);

    let err = compiler
        .compile(
            &CompileOptions::default(),
            Program::Module(&module),
            &fake_topology(),
            Some(&client as &dyn Client),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unimplemented);

    // With a matching client the same module reaches lowering.
    let err = compiler
        .compile(&CompileOptions::default(), Program::Module(&module), &topology, Some(&client as &dyn Client))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
}

#[test]
fn test_oversized_constant_fails_lowering() {
    init_logger();
    let text = "func.func @main() -> tensor<100000000000xi32> {\n  %0 = mhlo.constant dense<0> : tensor<100000000000xi32>\n  return %0 : tensor<100000000000xi32>\n}";
    let context = ModuleContext::new();
    let module = context.parse_module(text).unwrap();
    let client = client();
    let topology = client.topology_description().unwrap();

    let err = HostCompiler::new()
        .compile(&CompileOptions::default(), Program::Module(&module), &topology, Some(&client as &dyn Client))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoweringFailure);
}
