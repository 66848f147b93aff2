//! Verification queries over the generated network.

use rendezvous_automata::{Model, Query, QueryCategory, SourceLocation};
use rendezvous_ir::{FuncId, ReachabilityAnnotation};

use crate::func::FuncOutput;
use crate::layout::{FuncInfo, Layout};
use crate::resources::{
    CHANNEL_PROCESS, MAIN_ENDED, MUTEX_PROCESS, OUT_OF_RESOURCES, WAIT_GROUP_PROCESS,
};

pub(crate) fn instance_name(info: &FuncInfo, index: usize) -> String {
    format!("{}_{index}", info.name)
}

/// `inst.state` for every instance of the function and every listed state.
fn any_in(info: &FuncInfo, states: &[String]) -> Vec<String> {
    (0..info.bound)
        .flat_map(|i| {
            let inst = instance_name(info, i);
            states.iter().map(move |s| format!("{inst}.{s}"))
        })
        .collect()
}

fn disjunction(terms: &[String]) -> String {
    format!("({})", terms.join(" || "))
}

fn blocking_states(out: &FuncOutput, category: QueryCategory) -> &[String] {
    match category {
        QueryCategory::NoChannelDeadlock => &out.blocking.channel,
        QueryCategory::NoMutexDeadlock => &out.blocking.mutex,
        QueryCategory::NoWaitGroupDeadlock => &out.blocking.wait_group,
        QueryCategory::NoOnceDeadlock => &out.blocking.once,
        _ => &[],
    }
}

pub(crate) fn emit_queries(layout: &Layout<'_>, outputs: &[(FuncId, FuncOutput)], model: &mut Model) {
    let options = layout.options;
    let mut add = |query: Query| {
        if options.emits(query.category) {
            model.add_query(query);
        }
    };

    add(Query::new(
        QueryCategory::ResourceBound,
        format!("A[] not {OUT_OF_RESOURCES}"),
        "no resource pool is exhausted",
    ));

    let safety = [
        (QueryCategory::ChannelSafety, CHANNEL_PROCESS, layout.channels, "channel"),
        (QueryCategory::MutexSafety, MUTEX_PROCESS, layout.mutexes, "mutex"),
        (
            QueryCategory::WaitGroupSafety,
            WAIT_GROUP_PROCESS,
            layout.wait_groups,
            "wait group",
        ),
    ];
    for (category, process, count, what) in safety {
        for i in 0..count {
            add(Query::new(
                category,
                format!("A[] not {process}_{i}.bad"),
                format!("{what} {i} is never misused"),
            ));
        }
    }

    let deadlocks = [
        (QueryCategory::NoChannelDeadlock, "channel"),
        (QueryCategory::NoMutexDeadlock, "mutex"),
        (QueryCategory::NoWaitGroupDeadlock, "wait group"),
        (QueryCategory::NoOnceDeadlock, "once"),
    ];
    for (category, what) in deadlocks {
        let terms: Vec<String> = outputs
            .iter()
            .flat_map(|(id, out)| any_in(layout.func(*id), blocking_states(out, category)))
            .collect();
        if terms.is_empty() {
            continue;
        }
        add(Query::new(
            category,
            format!(
                "A[] not (deadlock && !{MAIN_ENDED} && {})",
                disjunction(&terms)
            ),
            format!("no deadlock while waiting on a {what}"),
        ));
    }

    let nil_terms: Vec<String> = outputs
        .iter()
        .filter_map(|(id, out)| {
            out.called_nil
                .as_ref()
                .map(|s| any_in(layout.func(*id), std::slice::from_ref(s)))
        })
        .flatten()
        .collect();
    if !nil_terms.is_empty() {
        add(Query::new(
            QueryCategory::NoNilCall,
            format!("A[] not {}", disjunction(&nil_terms)),
            "no nil function value is called",
        ));
    }

    for (id, _) in outputs {
        let info = layout.func(*id);
        if !info.can_panic || !(info.is_entry || info.spawned) {
            continue;
        }
        let n = &info.name;
        let mut terms = Vec::new();
        for i in 0..info.bound {
            let inst = instance_name(info, i);
            if info.is_entry && i == 0 {
                terms.push(format!("({inst}.ended && {n}_panicking[{i}])"));
            } else if info.spawned {
                terms.push(format!(
                    "({inst}.ended && {n}_panicking[{i}] && {n}_async[{i}])"
                ));
            }
        }
        add(Query::new(
            QueryCategory::NoPanickingExit,
            format!("A[] not {}", disjunction(&terms)),
            format!("{n} never ends a task by panicking"),
        ));
    }

    let program = layout.program;
    for (id, out) in outputs {
        let info = layout.func(*id);
        for a in &out.annotations {
            let reached = disjunction(&any_in(info, std::slice::from_ref(&a.state)));
            let (formula, verb) = match a.annotation {
                ReachabilityAnnotation::Reachable => (format!("E<> {reached}"), "is reachable"),
                ReachabilityAnnotation::Unreachable => {
                    (format!("A[] not {reached}"), "is unreachable")
                }
            };
            let (line, column) = match program.line_col(a.span.start) {
                Some((l, c)) => (Some(l), Some(c)),
                None => (None, None),
            };
            add(Query::new(
                QueryCategory::Reachability,
                formula,
                format!("case {} of select {} in {} {verb}", a.case, a.select, info.name),
            )
            .at(SourceLocation {
                file: program.file.clone(),
                start: a.span.start,
                end: a.span.end,
                line,
                column,
            }));
        }
    }
}
