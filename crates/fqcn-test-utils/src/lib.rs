//! Testing utilities for the FQCN workspace
//!
//! Shared mapping tables, sample documents and on-disk project trees.

#![allow(missing_docs)]

use fqcn_core::{ControlKeywordSet, Document, MappingTable};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Task list with one short module that nests a same-named parameter
pub const USER_TASK: &str = "\
- name: Add user
  user:
    name: johnd
    group: admin
";

/// Task list whose only module is already qualified
pub const QUALIFIED_TASK: &str = "\
- name: Create group
  ns.col.group:
    name: admin
    state: present
";

/// Playbook with two short modules in tasks and handlers
pub const PLAYBOOK: &str = "\
- hosts: all
  tasks:
    - name: Create group
      group:
        name: admin
  handlers:
    - name: notify user
      user: name=johnd
";

/// Text that does not parse
pub const BROKEN: &str = "- name: broken\n  user: [unclosed\n";

/// `user → ns.col.user`, `group → ns.col.group`
pub fn sample_table() -> MappingTable {
    MappingTable::from_pairs([("user", "ns.col.user"), ("group", "ns.col.group")])
}

pub fn parse_tasks(text: &str) -> Document {
    Document::parse("roles/test/tasks/main.yml", text, &ControlKeywordSet::builtin()).unwrap()
}

/// Write `files` (relative path, contents) under `root`, creating directories
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(rel, contents)| {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, contents).unwrap();
            path
        })
        .collect()
}

/// Role-shaped project with task and handler files plus a vars file
pub fn write_project(root: &Path, name: &str, tasks: &str) -> PathBuf {
    let project = root.join(name);
    write_tree(
        &project,
        &[
            ("roles/app/tasks/main.yml", tasks),
            ("roles/app/handlers/main.yml", "- name: restart\n  service: name=app state=restarted\n"),
            ("roles/app/defaults/main.yml", "user: app\ngroup: app\n"),
        ],
    );
    project
}

/// Three projects; the middle one carries an unparsable file
pub fn three_projects() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), "project1", USER_TASK);
    let second = write_project(dir.path(), "project2", QUALIFIED_TASK);
    write_tree(&second, &[("roles/app/tasks/broken.yml", BROKEN)]);
    write_project(dir.path(), "project3", PLAYBOOK);
    dir
}

/// Count files under `root` whose name ends with `suffix`
pub fn count_files_with_suffix(root: &Path, suffix: &str) -> usize {
    fn walk(dir: &Path, suffix: &str, count: &mut usize) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, suffix, count);
            } else if path.to_string_lossy().ends_with(suffix) {
                *count += 1;
            }
        }
    }
    let mut count = 0;
    walk(root, suffix, &mut count);
    count
}
