//! Built-in skeleton templates.

use super::ProjectType;

/// Files of the built-in skeleton for a project type, as `(path, contents)`.
pub fn skeleton_files(project_type: ProjectType) -> Vec<(&'static str, &'static str)> {
    let mut files = vec![
        (".cursor/rules/workflow.mdc", WORKFLOW_RULE),
        ("tasks/.gitkeep", ""),
    ];

    match project_type {
        ProjectType::Node => {
            files.push(("package.json", NODE_PACKAGE_JSON));
            files.push(("tsconfig.json", NODE_TSCONFIG));
            files.push(("src/index.ts", NODE_INDEX));
            files.push((".gitignore", NODE_GITIGNORE));
            files.push(("README.md", README));
        }
        ProjectType::Rust => {
            files.push(("Cargo.toml", RUST_CARGO_TOML));
            files.push(("src/main.rs", RUST_MAIN));
            files.push((".gitignore", RUST_GITIGNORE));
            files.push(("README.md", README));
        }
        ProjectType::Generic => {
            files.push(("src/.gitkeep", ""));
            files.push(("README.md", README));
        }
    }

    files
}

/// Editor rule describing the approval-gated workflow
const WORKFLOW_RULE: &str = r#"---
description: Feature workflow - PRD, task list, one task at a time
alwaysApply: true
---

1. Run `prdflow request "<feature>"` and review the generated PRD in tasks/.
2. Approve it with `prdflow approve-prd <slug> <version>`.
3. Review the task list, then `prdflow approve-tasks <slug> <version>`.
4. `prdflow start <id>`, implement, `prdflow done <id>`. One task at a time.
"#;

const README: &str = r#"# New Project

Scaffolded by prdflow.

Feature work is tracked in `tasks/`: each feature gets a versioned PRD and
a task list that must be approved before implementation starts.
"#;

const NODE_PACKAGE_JSON: &str = r#"{
  "name": "app",
  "version": "0.1.0",
  "private": true,
  "type": "module",
  "scripts": {
    "build": "tsc -p .",
    "test": "node --test"
  },
  "devDependencies": {
    "typescript": "^5.4.0"
  }
}
"#;

const NODE_TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ES2022",
    "module": "NodeNext",
    "strict": true,
    "outDir": "dist"
  },
  "include": ["src"]
}
"#;

const NODE_INDEX: &str = "export {};\n";

const NODE_GITIGNORE: &str = "node_modules/\ndist/\ncoverage/\n.env\n";

const RUST_CARGO_TOML: &str = r#"[package]
name = "app"
version = "0.1.0"
edition = "2021"

[dependencies]
"#;

const RUST_MAIN: &str = r#"fn main() {
    println!("Hello, world!");
}
"#;

const RUST_GITIGNORE: &str = "/target\n.env\n";
