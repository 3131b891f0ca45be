//! End-to-end tests over the disassemble → trace → assemble pipeline.

use doppio_classfile::analysis::{MethodContext, PermissiveHierarchy, Trace, TraceOptions};
use doppio_classfile::assemble::{AssembleOptions, CodeOutput, assemble};
use doppio_classfile::attributes::{
    ExceptionTableEntry, Instruction, TableSwitch, instructions_from_bytes,
};
use doppio_classfile::graph::{EdgeKind, InsnGraph};
use doppio_classfile::{ConstantPool, Result, Verifier, VerifyErrorKind, Version};
use std::io::Cursor;

fn static_method(name: &'static str, descriptor: &'static str) -> MethodContext<'static> {
    MethodContext {
        class_name: "Scenario",
        name,
        descriptor,
        is_static: true,
    }
}

struct Pipeline {
    graph: InsnGraph,
    trace: Trace,
    output: CodeOutput,
    constant_pool: ConstantPool,
    verifier: Verifier,
}

fn run_pipeline(
    code: Vec<(u32, Instruction)>,
    exception_table: Vec<ExceptionTableEntry>,
    method: MethodContext,
    options: AssembleOptions,
) -> Result<Pipeline> {
    let mut constant_pool = ConstantPool::new();
    let mut verifier = Verifier::new();
    let graph = InsnGraph::disassemble(&code, &exception_table, &constant_pool, &mut verifier)?;
    let trace = Trace::run(
        &graph,
        &method,
        &constant_pool,
        &PermissiveHierarchy,
        TraceOptions::default(),
        &mut verifier,
    )?;
    let output = assemble(
        &graph,
        &trace,
        &method,
        &Version::JAVA_8,
        &mut constant_pool,
        &options,
        &mut verifier,
    )?;
    Ok(Pipeline {
        graph,
        trace,
        output,
        constant_pool,
        verifier,
    })
}

#[test]
fn test_empty_method() -> Result<()> {
    let pipeline = run_pipeline(
        vec![(0, Instruction::Return)],
        vec![],
        static_method("empty", "()V"),
        AssembleOptions::default(),
    )?;

    assert!(pipeline.verifier.is_empty());
    assert_eq!(1, pipeline.graph.len());
    assert_eq!(0, pipeline.trace.max_stack);
    assert_eq!(0, pipeline.trace.max_locals);
    assert_eq!(vec![0xB1], pipeline.output.to_bytes()?);
    Ok(())
}

#[test]
fn test_int_add() -> Result<()> {
    let code = vec![
        (0, Instruction::Iload_0),
        (1, Instruction::Iload_1),
        (2, Instruction::Iadd),
        (3, Instruction::Ireturn),
    ];
    let pipeline = run_pipeline(
        code,
        vec![],
        static_method("add", "(II)I"),
        AssembleOptions::default(),
    )?;

    assert!(pipeline.verifier.is_empty());
    assert_eq!(1, pipeline.graph.len());
    assert_eq!(2, pipeline.trace.max_stack);
    assert_eq!(2, pipeline.trace.max_locals);
    assert_eq!(vec![26, 27, 96, 172], pipeline.output.to_bytes()?);
    assert_eq!(
        Some(&Vec::new()),
        pipeline.output.stack_map_frames.as_ref()
    );
    Ok(())
}

#[test]
fn test_conditional_emits_one_frame() -> Result<()> {
    // if (x != 0) return 1; else return 0;
    let code = vec![
        (0, Instruction::Iload_0),
        (1, Instruction::Ifeq(6)),
        (4, Instruction::Iconst_1),
        (5, Instruction::Ireturn),
        (6, Instruction::Iconst_0),
        (7, Instruction::Ireturn),
    ];
    let pipeline = run_pipeline(
        code,
        vec![],
        static_method("choose", "(I)I"),
        AssembleOptions::default(),
    )?;

    assert!(pipeline.verifier.is_empty());
    assert_eq!(3, pipeline.graph.len());
    assert_eq!(1, pipeline.trace.max_stack);

    // The round trip reproduces the original layout.
    assert_eq!(
        vec![26, 153, 0, 5, 4, 172, 3, 172],
        pipeline.output.to_bytes()?
    );

    let frames = pipeline.output.stack_map_frames.expect("stack map frames");
    assert_eq!(1, frames.len());
    Ok(())
}

#[test]
fn test_tableswitch_round_trip() -> Result<()> {
    let table = TableSwitch {
        default: 34,
        low: 0,
        high: 2,
        offsets: vec![28, 30, 32],
    };
    let code = vec![
        (0, Instruction::Iload_0),
        (1, Instruction::Tableswitch(table)),
        (28, Instruction::Iconst_0),
        (29, Instruction::Ireturn),
        (30, Instruction::Iconst_1),
        (31, Instruction::Ireturn),
        (32, Instruction::Iconst_2),
        (33, Instruction::Ireturn),
        (34, Instruction::Iconst_m1),
        (35, Instruction::Ireturn),
    ];
    let pipeline = run_pipeline(
        code,
        vec![],
        static_method("pick", "(I)I"),
        AssembleOptions::default(),
    )?;
    assert!(pipeline.verifier.is_empty());

    // One switch edge per case plus the default.
    let switch_edges = pipeline
        .graph
        .edges()
        .filter(|edge| matches!(edge.kind, EdgeKind::Switch { .. }))
        .count();
    assert_eq!(4, switch_edges);

    // After reassembly the instruction's offsets are bound again.
    let reassembled = pipeline
        .output
        .code
        .iter()
        .find_map(|(_, instruction)| match instruction {
            Instruction::Tableswitch(table) => Some(table.clone()),
            _ => None,
        })
        .expect("tableswitch");
    assert_eq!(3, reassembled.offsets.len());
    assert_ne!(0, reassembled.default);

    // And the stream decodes to the same shape it encoded from.
    let bytes = pipeline.output.to_bytes()?;
    let decoded = instructions_from_bytes(&mut Cursor::new(bytes))?;
    assert_eq!(pipeline.output.code, decoded);
    Ok(())
}

#[test]
fn test_try_catch_over_array_allocation() -> Result<()> {
    // try { new int[n] } catch (any) { return }
    let code = vec![
        (0, Instruction::Iload_0),
        (1, Instruction::Newarray(doppio_classfile::attributes::ArrayType::Int)),
        (3, Instruction::Pop),
        (4, Instruction::Return),
        (5, Instruction::Pop),
        (6, Instruction::Return),
    ];
    let exception_table = vec![ExceptionTableEntry {
        range_pc: 0..4,
        handler_pc: 5,
        catch_type: 0,
    }];
    let pipeline = run_pipeline(
        code,
        exception_table,
        static_method("guarded", "(I)V"),
        AssembleOptions::default(),
    )?;
    assert!(pipeline.verifier.is_empty());

    let exception_edge = pipeline
        .graph
        .edges()
        .find(|edge| matches!(edge.kind, EdgeKind::Exception { .. }))
        .expect("exception edge");
    assert_eq!(
        EdgeKind::Exception {
            priority: 0,
            inline_coverage: false
        },
        exception_edge.kind
    );

    // The handler's entry frame holds exactly the throwable.
    let handler = exception_edge.to.expect("handler label");
    let states = pipeline.trace.entry_states(handler);
    assert!(!states.is_empty());
    for state in states {
        assert_eq!(1, state.stack.len());
        assert_eq!(
            doppio_classfile::analysis::FrameType::throwable(),
            state.stack[0].ty
        );
    }

    assert_eq!(1, pipeline.output.exception_table.len());
    let row = &pipeline.output.exception_table[0];
    assert_eq!(0, row.catch_type);
    assert_eq!(5, row.handler_pc);
    Ok(())
}

#[test]
fn test_invalid_catch_type_is_reported() -> Result<()> {
    // The exception table claims to catch a primitive array, which can never extend
    // Throwable; the diagnostic fires while the handler is still traced.
    let mut constant_pool = ConstantPool::new();
    let catch_type = constant_pool.add_class("[I")?;
    let code = vec![
        (0, Instruction::Nop),
        (1, Instruction::Return),
        (2, Instruction::Pop),
        (3, Instruction::Return),
    ];
    let exception_table = vec![ExceptionTableEntry {
        range_pc: 0..2,
        handler_pc: 2,
        catch_type,
    }];

    let mut verifier = Verifier::new();
    let graph = InsnGraph::disassemble(&code, &exception_table, &constant_pool, &mut verifier)?;
    assert!(verifier.is_empty());

    let trace = Trace::run(
        &graph,
        &static_method("guarded", "()V"),
        &constant_pool,
        &PermissiveHierarchy,
        TraceOptions::default(),
        &mut verifier,
    )?;
    assert_eq!(1, verifier.len());
    assert_eq!(VerifyErrorKind::InvalidType, verifier.errors()[0].kind);
    assert!(verifier.errors()[0].message.contains("[I"));

    let handler = graph
        .edges()
        .find_map(|edge| match edge.kind {
            EdgeKind::Exception { .. } => edge.to,
            _ => None,
        })
        .expect("handler label");
    assert!(trace.reached(handler));
    Ok(())
}

#[test]
fn test_unbound_jump_is_preserved() -> Result<()> {
    // An obfuscated goto pointing past the end of the code.
    let code = vec![(0, Instruction::Goto(40)), (3, Instruction::Return)];
    let options = AssembleOptions {
        do_raise: false,
        ..AssembleOptions::default()
    };
    let pipeline = run_pipeline(code, vec![], static_method("oops", "()V"), options)?;

    assert_eq!(1, pipeline.verifier.len());
    assert_eq!(
        VerifyErrorKind::InvalidEdge,
        pipeline.verifier.errors()[0].kind
    );

    // The raw goto survives, followed by the synthetic fallthrough continuation.
    assert_eq!(
        vec![Instruction::Goto(40), Instruction::Return],
        pipeline
            .output
            .code
            .iter()
            .map(|(_, instruction)| instruction.clone())
            .collect::<Vec<Instruction>>()
    );
    Ok(())
}

#[test]
fn test_wide_conditional_substitution() -> Result<()> {
    // A conditional branch whose target is further than a signed 16 bit displacement.
    let mut graph = InsnGraph::new();
    let entry = graph.new_block();
    let filler = graph.new_block();
    let far = graph.new_block();
    graph.block_mut(entry).expect("entry").push(Instruction::Iload_0);
    {
        let block = graph.block_mut(filler).expect("filler");
        for _ in 0..40_000 {
            block.push(Instruction::Nop);
        }
    }
    graph.block_mut(far).expect("far").push(Instruction::Iconst_0);
    graph
        .connect(doppio_classfile::graph::Edge::jump(
            entry,
            far,
            Instruction::Ifeq(0),
        ))
        .expect("connect");
    graph
        .connect(doppio_classfile::graph::Edge::fallthrough(entry, filler))
        .expect("connect");
    graph
        .connect(doppio_classfile::graph::Edge::returning(
            filler,
            Instruction::Return,
        ))
        .expect("connect");
    graph
        .connect(doppio_classfile::graph::Edge::returning(
            far,
            Instruction::Ireturn,
        ))
        .expect("connect");

    let method = static_method("stretch", "(I)I");
    let mut constant_pool = ConstantPool::new();
    let mut verifier = Verifier::new();
    let trace = Trace::run(
        &graph,
        &method,
        &constant_pool,
        &PermissiveHierarchy,
        TraceOptions::default(),
        &mut verifier,
    )?;
    let output = assemble(
        &graph,
        &trace,
        &method,
        &Version::JAVA_8,
        &mut constant_pool,
        &AssembleOptions::default(),
        &mut verifier,
    )?;
    assert!(verifier.is_empty());

    // The narrow conditional became its inversion skipping over a wide goto.
    let instructions: Vec<&Instruction> =
        output.code.iter().map(|(_, instruction)| instruction).collect();
    assert!(matches!(instructions[1], Instruction::Ifne(_)));
    assert!(matches!(instructions[2], Instruction::Goto_w(_)));

    // The stream still decodes cleanly.
    let decoded = instructions_from_bytes(&mut Cursor::new(output.to_bytes()?))?;
    assert_eq!(output.code.len(), decoded.len());
    Ok(())
}

#[test]
fn test_reassembly_is_idempotent() -> Result<()> {
    let code = vec![
        (0, Instruction::Iload_0),
        (1, Instruction::Ifeq(6)),
        (4, Instruction::Iconst_1),
        (5, Instruction::Ireturn),
        (6, Instruction::Iconst_0),
        (7, Instruction::Ireturn),
    ];
    let method = static_method("choose", "(I)I");
    let first = run_pipeline(code, vec![], method, AssembleOptions::default())?;

    // Disassembling the assembled output yields the same block and edge structure.
    let mut verifier = Verifier::new();
    let second = InsnGraph::disassemble(
        &first.output.code,
        &first.output.exception_table,
        &first.constant_pool,
        &mut verifier,
    )?;
    assert!(verifier.is_empty());
    assert_eq!(first.graph.len(), second.len());

    let kinds = |graph: &InsnGraph| {
        let mut kinds: Vec<String> = graph
            .edges()
            .map(|edge| format!("{:?}", edge.kind))
            .collect();
        kinds.sort();
        kinds
    };
    assert_eq!(kinds(&first.graph), kinds(&second));
    Ok(())
}

#[test]
fn test_dead_blocks_are_nopped_or_removed() -> Result<()> {
    // entry returns immediately; a second block is unreachable.
    let code = vec![
        (0, Instruction::Return),
        (1, Instruction::Iconst_0),
        (2, Instruction::Ireturn),
    ];
    let kept = run_pipeline(
        code.clone(),
        vec![],
        static_method("dead", "()V"),
        AssembleOptions::default(),
    )?;
    // The unreachable block was nopped into a throwing shape.
    assert!(
        kept.output
            .code
            .iter()
            .any(|(_, instruction)| matches!(instruction, Instruction::Athrow))
    );

    let removed = run_pipeline(
        code,
        vec![],
        static_method("dead", "()V"),
        AssembleOptions {
            remove_dead_blocks: true,
            ..AssembleOptions::default()
        },
    )?;
    assert_eq!(vec![0xB1], removed.output.to_bytes()?);
    Ok(())
}

#[test]
fn test_max_bounds_are_upper_bounds() -> Result<()> {
    // Exercise wide values: long arithmetic plus a conversion.
    let code = vec![
        (0, Instruction::Lload_0),
        (1, Instruction::Lload_2),
        (2, Instruction::Ladd),
        (3, Instruction::L2i),
        (4, Instruction::Ireturn),
    ];
    let pipeline = run_pipeline(
        code,
        vec![],
        static_method("sum", "(JJ)I"),
        AssembleOptions::default(),
    )?;
    assert!(pipeline.verifier.is_empty());
    assert_eq!(4, pipeline.trace.max_stack);
    assert_eq!(4, pipeline.trace.max_locals);
    assert_eq!(4, pipeline.output.max_stack);
    assert_eq!(4, pipeline.output.max_locals);
    Ok(())
}
