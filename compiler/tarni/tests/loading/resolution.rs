//! Where packages come from: relative paths, library roots, the tool
//! tree and the real filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tarni::{
    buffer_handler, AstDumpHook, BuildContext, FileSystem, Interpreter, LoadError, LocationError,
    MemoryFileSystem, Options, Value,
};

use crate::common::{expect_err, linux, run, Tree, SOURCE_ROOT};

#[test]
fn relative_imports_nest_from_the_importing_package() {
    let tree = Tree::new()
        .file(
            "app/main.tarn",
            "package main\nimport \"./lib/mathx\"\nfunc main() {\nprintln(mathx.Square(mathx.Base))\n}\n",
        )
        .file(
            "app/lib/mathx/mathx.tarn",
            "package mathx\nimport \"../consts\"\nvar Base = consts.Three\nfunc Square(n int) int {\nreturn n * n\n}\n",
        )
        .file("app/lib/consts/consts.tarn", "package consts\nconst Three = 3\n");
    let interp = tree.interpreter();
    assert_eq!(run(&interp, "app").unwrap(), "9\n");
    assert_eq!(interp.package_name("./app/lib/consts").as_deref(), Some("consts"));
}

#[test]
fn library_packages_come_from_package_roots() {
    let tree = Tree::new()
        .file(
            "app/main.tarn",
            "package main\nimport \"text/shout\"\nfunc main() {\nprintln(shout.Loud(\"hey\"))\n}\n",
        )
        .file(
            "/libs/src/text/shout/shout.tarn",
            "package shout\nimport \"text/marks\"\nfunc Loud(s string) string {\nreturn s + marks.Bang\n}\n",
        )
        .file("/libs/src/text/marks/marks.tarn", "package marks\nconst Bang = \"!\"\n");
    let interp = tree.interpreter();
    assert_eq!(run(&interp, "app").unwrap(), "hey!\n");
    assert_eq!(interp.package_name("text/marks").as_deref(), Some("marks"));
}

fn options_interpreter(options: Options, fs: MemoryFileSystem) -> Interpreter {
    Interpreter::builder()
        .options(Options {
            build: linux(),
            ..options
        })
        .file_system(Arc::new(fs))
        .print_handler(buffer_handler())
        .source_root(SOURCE_ROOT)
        .build()
}

#[test]
fn discovery_follows_options() {
    let fs = MemoryFileSystem::new()
        .with_file("/opt/Tarn/pkg/codec/json/json.tarn", "package json\nvar Kind = \"tool\"\n")
        .with_file("/pinned/json/json.tarn", "package json\nvar Kind = \"pinned\"\n")
        .with_file("/roots/a/src/net/http/http.tarn", "package http\nvar Kind = \"root\"\n");
    let options = Options {
        package_roots: vec![PathBuf::from("/roots/a")],
        tool_root: Some(PathBuf::from("/opt/Tarn/bin")),
        package_index: [("codec/json".to_string(), PathBuf::from("/pinned/json"))]
            .into_iter()
            .collect(),
        ..Options::default()
    };
    let interp = options_interpreter(options, fs);

    interp.import("codec/json").unwrap();
    assert_eq!(
        interp.lookup_global("codec/json", "Kind"),
        Some(Value::string("pinned"))
    );
    interp.import("net/http").unwrap();
    assert_eq!(
        interp.lookup_global("net/http", "Kind"),
        Some(Value::string("root"))
    );
}

#[test]
fn tool_tree_is_searched_last() {
    let fs = MemoryFileSystem::new()
        .with_file("/opt/Tarn/pkg/codec/json/json.tarn", "package json\nvar Kind = \"tool\"\n");
    let options = Options {
        tool_root: Some(PathBuf::from("/opt/Tarn/bin")),
        ..Options::default()
    };
    let interp = options_interpreter(options, fs);
    interp.import("codec/json").unwrap();
    assert_eq!(
        interp.lookup_global("codec/json", "Kind"),
        Some(Value::string("tool"))
    );
}

#[test]
fn unconfigured_environment_is_reported() {
    let fs = MemoryFileSystem::new().with_file(
        "/work/app/main.tarn",
        "package main\nimport \"x/y\"\nfunc main() {}\n",
    );
    let interp = options_interpreter(Options::default(), fs);
    let err = expect_err(interp.eval_path("app"));
    assert!(
        matches!(
            &err,
            LoadError::Location(LocationError::EnvironmentNotConfigured { import_path })
                if import_path == "x/y"
        ),
        "{err:?}"
    );
}

#[test]
fn build_context_selects_files() {
    let files = [
        ("plat/common.tarn", "package plat\nvar Name = Tag\n"),
        ("plat/tag_linux.tarn", "package plat\nconst Tag = \"linux\"\n"),
        ("plat/tag_darwin.tarn", "package plat\nconst Tag = \"darwin\"\n"),
        ("plat/tag_windows_amd64.tarn", "package plat\nconst Tag = \"windows\"\n"),
        (
            "plat/extra.tarn",
            "// Generated.\n\n//tarn:build linux && fast\n\npackage plat\nvar Fast = true\n",
        ),
        ("plat/legacy.tarn", "// +build ignore\n\npackage plat\nthis is not code\n"),
    ];
    let tree_for = |build: BuildContext| {
        files
            .iter()
            .fold(Tree::new().build_context(build), |tree, (path, src)| tree.file(path, src))
    };

    let interp = tree_for(linux()).interpreter();
    interp.import("./plat").unwrap();
    assert_eq!(interp.lookup_global("./plat", "Name"), Some(Value::string("linux")));
    assert_eq!(interp.lookup_global("./plat", "Fast"), None);

    let windows = BuildContext {
        os: "windows".to_string(),
        arch: "amd64".to_string(),
        tags: Vec::new(),
    };
    let interp = tree_for(windows).interpreter();
    interp.import("./plat").unwrap();
    assert_eq!(interp.lookup_global("./plat", "Name"), Some(Value::string("windows")));

    let fast = BuildContext {
        tags: vec!["fast".to_string()],
        ..linux()
    };
    let tree = tree_for(fast);
    let interp = tree.interpreter();
    interp.import("./plat").unwrap();
    assert_eq!(interp.lookup_global("./plat", "Fast"), Some(Value::Bool(true)));
    assert_eq!(tree.fs().reads("/work/plat/tag_darwin.tarn"), 0);
}

#[test]
fn loads_from_the_real_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app");
    let util = dir.path().join("util");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::create_dir_all(&util).unwrap();
    // Listed by name, so b.tarn's init runs second.
    std::fs::write(
        app.join("b.tarn"),
        "package main\nfunc init() {\nprintln(\"b\")\n}\n",
    )
    .unwrap();
    std::fs::write(
        app.join("a.tarn"),
        "package main\nimport \"../util\"\nfunc init() {\nprintln(\"a\")\n}\nfunc main() {\nprintln(util.Greeting)\n}\n",
    )
    .unwrap();
    std::fs::write(util.join("util.tarn"), "package util\nvar Greeting = \"hello\"\n").unwrap();
    std::fs::write(util.join("notes.txt"), "ignored").unwrap();

    let interp = Interpreter::builder()
        .build_context(linux())
        .print_handler(buffer_handler())
        .source_root(dir.path())
        .build();
    assert_eq!(run(&interp, "app").unwrap(), "a\nb\nhello\n");

    let absolute = Interpreter::builder()
        .build_context(linux())
        .print_handler(buffer_handler())
        .build();
    assert_eq!(run(&absolute, &app.display().to_string()).unwrap(), "a\nb\nhello\n");
}

#[test]
fn ast_hook_dumps_every_parsed_file() {
    let out = tempfile::tempdir().unwrap();
    let fs: Arc<dyn FileSystem> = Arc::new(
        MemoryFileSystem::new()
            .with_file("/work/app/main.tarn", "package main\nimport \"../dep\"\nfunc main() {}\n")
            .with_file("/work/dep/dep.tarn", "package dep\nvar V = 1\n"),
    );
    let interp = Interpreter::builder()
        .build_context(linux())
        .file_system(fs)
        .hook(Arc::new(AstDumpHook::new(out.path())))
        .print_handler(buffer_handler())
        .source_root(SOURCE_ROOT)
        .build();
    interp.eval_path("app").unwrap();

    let main = std::fs::read_to_string(out.path().join("main.ast")).unwrap();
    assert!(
        main.starts_with("file /work/app/main.tarn package main\n  import \"../dep\" as dep\n"),
        "{main}"
    );
    let dep = std::fs::read_to_string(out.path().join("dep.ast")).unwrap();
    assert!(dep.contains("var V"), "{dep}");
}
