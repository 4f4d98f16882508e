//! Property tests for the analyzer and conversion engine

use fqcn_core::prelude::*;
use fqcn_core::Node;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fmt::Write as _;

const MODULES: &[&str] = &["user", "group", "copy", "file", "custom_mod", "ns.col.thing"];
const PARAMS: &[&str] = &["name", "group", "user", "state", "src", "copy", "file"];
const CONTROLS: &[&str] = &["when", "tags", "register", "become", "notify", "loop"];

fn table() -> MappingTable {
    MappingTable::from_pairs([
        ("user", "ns.col.user"),
        ("group", "ns.col.group"),
        ("copy", "ansible.builtin.copy"),
        ("file", "ansible.builtin.file"),
    ])
}

#[derive(Debug, Clone)]
struct Task {
    module: &'static str,
    params: Vec<(&'static str, String)>,
    controls: Vec<(&'static str, String)>,
    module_position: usize,
    flow: bool,
}

impl Task {
    fn render(&self, index: usize, out: &mut String) {
        let _ = writeln!(out, "- name: task {index}");
        for (i, (key, value)) in self.controls.iter().enumerate() {
            if i == self.module_position {
                self.render_module(out);
            }
            let _ = writeln!(out, "  {key}: {value}");
        }
        if self.module_position >= self.controls.len() {
            self.render_module(out);
        }
    }

    fn render_module(&self, out: &mut String) {
        if self.flow {
            let params: Vec<String> = self.params.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            let _ = writeln!(out, "  {}: {{{}}}", self.module, params.join(", "));
        } else if self.params.is_empty() {
            let _ = writeln!(out, "  {}:", self.module);
        } else {
            let _ = writeln!(out, "  {}:   # module", self.module);
            for (key, value) in &self.params {
                let _ = writeln!(out, "    {key}: {value}");
            }
        }
    }
}

fn value() -> impl Strategy<Value = String> {
    "v[a-z0-9]{0,6}"
}

fn unique_keys(pool: &'static [&'static str], max: usize) -> impl Strategy<Value = Vec<(&'static str, String)>> {
    proptest::collection::btree_set(proptest::sample::select(pool), 0..=max).prop_flat_map(|keys: BTreeSet<&'static str>| {
        let keys: Vec<&'static str> = keys.into_iter().collect();
        let n = keys.len();
        proptest::collection::vec(value(), n)
            .prop_map(move |values| keys.iter().copied().zip(values).collect::<Vec<_>>())
    })
}

fn task() -> impl Strategy<Value = Task> {
    (
        proptest::sample::select(MODULES),
        unique_keys(PARAMS, 4),
        unique_keys(CONTROLS, 3),
        0usize..4,
        any::<bool>(),
    )
        .prop_map(|(module, params, controls, module_position, flow)| Task {
            module,
            params,
            controls,
            module_position,
            flow,
        })
}

fn document() -> impl Strategy<Value = String> {
    proptest::collection::vec(task(), 1..6).prop_map(|tasks| {
        let mut out = String::from("---\n# generated\n");
        for (i, task) in tasks.iter().enumerate() {
            task.render(i, &mut out);
        }
        out
    })
}

fn parse(text: &str) -> Document {
    Document::parse("roles/r/tasks/main.yml", text, &ControlKeywordSet::builtin()).unwrap()
}

fn module_value<'a>(root: &'a Node, index: usize, key: &str) -> Option<&'a Node> {
    root.as_sequence()?.get(index)?.get(key)
}

proptest! {
    #[test]
    fn prop_conversion_is_idempotent(text in document()) {
        let engine = ConversionEngine::default();
        let first = engine.convert(&parse(&text), &table());
        prop_assert!(first.success, "{:?}", first.errors);

        let second = engine.convert(&parse(&first.after_text), &table());
        prop_assert!(second.success);
        prop_assert_eq!(second.changes_made, 0);
        prop_assert_eq!(&second.after_text, &first.after_text);
    }

    #[test]
    fn prop_parameters_are_preserved(tasks in proptest::collection::vec(task(), 1..5)) {
        let mut text = String::new();
        for (i, task) in tasks.iter().enumerate() {
            task.render(i, &mut text);
        }
        let before = parse(&text);
        let result = ConversionEngine::default().convert(&before, &table());
        prop_assert!(result.success, "{:?}", result.errors);
        let after = parse(&result.after_text);

        for (i, task) in tasks.iter().enumerate() {
            let new_key = table().lookup(task.module).unwrap_or(task.module).to_string();
            let old = module_value(&before.roots()[0], i, task.module);
            let new = module_value(&after.roots()[0], i, &new_key);
            prop_assert!(old.is_some() && new.is_some());
            prop_assert!(old.unwrap().ordered_eq(new.unwrap()));
        }
    }

    #[test]
    fn prop_single_candidate_is_module_key(task in task()) {
        let mut text = String::new();
        task.render(0, &mut text);
        let doc = parse(&text);
        let block = doc.task_blocks().next().unwrap();
        let c = TaskAnalyzer::new().classify(block, &table());
        prop_assert_eq!(c.module_key.as_deref(), Some(task.module));
        prop_assert!(c.extra_keys.is_empty());
    }

    #[test]
    fn prop_score_never_decreases(text in document()) {
        let validator = ValidationEngine::default();
        let before = validator.validate(&parse(&text), &table());
        let converted = ConversionEngine::default().convert(&parse(&text), &table());
        let after = validator.validate(&parse(&converted.after_text), &table());

        prop_assert!(after.score >= before.score);
        prop_assert_eq!(after.total_modules, before.total_modules);
        prop_assert_eq!(after.still_short, 0);
    }
}
