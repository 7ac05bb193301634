use std::fs;
use std::path::{Path, PathBuf};
use texpack_resolve::locator::{MapLocator, NoSystemLocator};
use texpack_resolve::{
    DependencyGraph, DirectiveKind, EdgeOutcome, FsReader, GraphBuilder, Origin, ResolutionTable,
    ResolveConfig, SystemLocator, WarningReason,
};

struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        for (name, text) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        Self { _dir: dir, root }
    }

    fn resolve_with(&self, locator: Box<dyn SystemLocator>) -> DependencyGraph {
        GraphBuilder::with_parts(
            &self.root,
            &ResolveConfig::default(),
            ResolutionTable::default(),
            locator,
            Box::new(FsReader),
        )
        .unwrap()
        .build("main.tex")
        .unwrap()
    }

    fn resolve(&self) -> DependencyGraph {
        self.resolve_with(Box::new(NoSystemLocator))
    }
}

fn files(graph: &DependencyGraph) -> Vec<String> {
    graph
        .project_files()
        .map(|n| graph.relative(&n.path).to_string_lossy().replace('\\', "/"))
        .collect()
}

#[test]
fn test_end_to_end_report_with_local_bst() {
    let project = Project::new(&[
        (
            "main.tex",
            r"\documentclass{report}
\begin{document}
\input{intro}
\bibliographystyle{plain}
\bibliography{refs}
\end{document}
",
        ),
        ("intro.tex", "Hello."),
        ("plain.bst", "% local style"),
        ("refs.bib", "@book{k, title={T}}"),
    ]);
    let system = MapLocator::new()
        .with("report.cls", "/texmf/tex/latex/base/report.cls")
        .with("plain.bst", "/texmf/bibtex/bst/base/plain.bst");

    for graph in [project.resolve(), project.resolve_with(Box::new(system))] {
        assert_eq!(
            files(&graph),
            vec!["main.tex", "intro.tex", "plain.bst", "refs.bib"]
        );
        assert!(graph.warnings().is_empty(), "{:?}", graph.warnings());
        assert_eq!(
            graph.system_dependencies(),
            vec![(DirectiveKind::DocumentClass, "report".to_string())]
        );
    }
}

#[test]
fn test_resolution_is_deterministic() {
    let project = Project::new(&[
        (
            "main.tex",
            r"\documentclass{article}
\usepackage{local,amsmath}
\input{a}\input{missing}
\include{chapters/b}",
        ),
        ("local.sty", r"\RequirePackage{xcolor}"),
        ("a.tex", ""),
        ("chapters/b.tex", r"\input{a}"),
    ]);
    let first = project.resolve();
    let second = project.resolve();
    assert_eq!(files(&first), files(&second));
    assert_eq!(first.warnings(), second.warnings());
    assert_eq!(first.warnings().len(), 1);
}

#[test]
fn test_file_included_twice_appears_once() {
    let project = Project::new(&[
        ("main.tex", r"\input{shared}\input{other}\input{shared.tex}"),
        ("other.tex", r"\input{shared}"),
        ("shared.tex", ""),
    ]);
    let graph = project.resolve();
    assert_eq!(files(&graph), vec!["main.tex", "shared.tex", "other.tex"]);
    assert!(graph.warnings().is_empty());

    let shared = graph.get(&project.root.join("shared.tex")).unwrap();
    let targets: Vec<_> = graph
        .nodes()
        .iter()
        .flat_map(|n| &n.edges)
        .filter_map(|e| match &e.outcome {
            EdgeOutcome::Resolved { target, .. } => *target,
            EdgeOutcome::Failed { .. } => None,
        })
        .filter(|&t| t == shared.id)
        .collect();
    assert_eq!(targets.len(), 3);
}

#[test]
fn test_local_class_wins_over_system() {
    let project = Project::new(&[
        ("main.tex", r"\documentclass{foo}"),
        ("foo.cls", r"\LoadClass{article}"),
    ]);
    let system = MapLocator::new().with("foo.cls", "/texmf/foo.cls");
    let graph = project.resolve_with(Box::new(system));
    assert_eq!(files(&graph), vec!["main.tex", "foo.cls"]);
    let class = graph.get(&project.root.join("foo.cls")).unwrap();
    assert_eq!(class.file.origin, Origin::Project);
    assert!(class.scanned);
}

#[test]
fn test_self_include_terminates_with_one_cycle() {
    let project = Project::new(&[("main.tex", r"\input{main}")]);
    let graph = project.resolve();
    assert_eq!(files(&graph), vec!["main.tex"]);
    let warnings = graph.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].reason, WarningReason::Cycle);
}

#[test]
fn test_mutual_include_terminates_with_one_cycle() {
    let project = Project::new(&[
        ("main.tex", r"\input{a}"),
        ("a.tex", r"\input{b}"),
        ("b.tex", r"\input{a}"),
    ]);
    let graph = project.resolve();
    assert_eq!(files(&graph), vec!["main.tex", "a.tex", "b.tex"]);
    let warnings = graph.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].reason, WarningReason::Cycle);
    assert_eq!(warnings[0].file, Path::new("b.tex"));
    assert_eq!(warnings[0].raw_argument, "a");
}

#[test]
fn test_wrapped_directive_is_followed() {
    let project = Project::new(&[
        (
            "main.tex",
            r"\newcommand{\appendixpart}{\input{appendix}}
\ifdraft{}{\include{final}}",
        ),
        ("appendix.tex", ""),
        ("final.tex", ""),
    ]);
    let graph = project.resolve();
    assert_eq!(files(&graph), vec!["main.tex", "appendix.tex", "final.tex"]);
}

#[test]
fn test_wrapped_directive_beyond_scan_depth_is_ignored() {
    let project = Project::new(&[
        ("main.tex", r"\a{\b{\c{\input{deep}}}}"),
        ("deep.tex", ""),
    ]);
    let config = ResolveConfig {
        max_scan_depth: 2,
        ..ResolveConfig::default()
    };
    let graph = GraphBuilder::with_parts(
        &project.root,
        &config,
        ResolutionTable::default(),
        Box::new(NoSystemLocator),
        Box::new(FsReader),
    )
    .unwrap()
    .build("main.tex")
    .unwrap();
    assert_eq!(files(&graph), vec!["main.tex"]);
}

#[test]
fn test_comments_and_verbatim_are_ignored() {
    let project = Project::new(&[
        (
            "main.tex",
            r"% \input{commented}
\begin{verbatim}
\input{shown}
\end{verbatim}
\begin{lstlisting}
\usepackage{listed}
\end{lstlisting}
\verb|\input{inline}|
\input{real}",
        ),
        ("commented.tex", ""),
        ("shown.tex", ""),
        ("listed.sty", ""),
        ("inline.tex", ""),
        ("real.tex", ""),
    ]);
    let graph = project.resolve();
    assert_eq!(files(&graph), vec!["main.tex", "real.tex"]);
}

#[test]
fn test_graphics_through_graphicspath() {
    let project = Project::new(&[
        (
            "main.tex",
            r"\graphicspath{{figures/}}
\input{chapters/results}",
        ),
        ("chapters/results.tex", r"\includegraphics[width=.5\linewidth]{plot}"),
        ("figures/plot.pdf", "%PDF"),
        ("figures/plot.png", "png"),
    ]);
    let graph = project.resolve();
    assert_eq!(
        files(&graph),
        vec!["main.tex", "chapters/results.tex", "figures/plot.pdf"]
    );
    assert!(graph.warnings().is_empty());
    assert!(!graph.get(&project.root.join("figures/plot.pdf")).unwrap().scanned);
}

#[test]
fn test_class_pulls_in_local_style() {
    let project = Project::new(&[
        ("main.tex", r"\documentclass[a4paper]{thesis}"),
        (
            "thesis.cls",
            r"\ProvidesClass{thesis}
\LoadClass{report}
\input{thesis.sty}",
        ),
        ("thesis.sty", r"\RequirePackage{thesis-fonts}"),
        ("thesis-fonts.sty", ""),
    ]);
    let graph = project.resolve();
    assert_eq!(
        files(&graph),
        vec!["main.tex", "thesis.cls", "thesis.sty", "thesis-fonts.sty"]
    );
    assert!(graph.warnings().is_empty());
}

#[test]
fn test_missing_input_is_reported_but_not_fatal() {
    let project = Project::new(&[("main.tex", "\\input{nope}\n\\input{\\jobname-data}")]);
    let graph = project.resolve();
    assert_eq!(files(&graph), vec!["main.tex"]);
    let reasons: Vec<_> = graph.warnings().into_iter().map(|w| w.reason).collect();
    assert_eq!(
        reasons,
        vec![WarningReason::NotFound, WarningReason::Unparseable]
    );
}

#[test]
fn test_search_dir_outside_root_is_scanned_not_archived() {
    let shared = Project::new(&[("common.sty", r"\RequirePackage{inner}"), ("inner.sty", "")]);
    let project = Project::new(&[("main.tex", r"\usepackage{common}")]);
    let config = ResolveConfig {
        search_dirs: vec![shared.root.clone()],
        ..ResolveConfig::default()
    };
    let graph = GraphBuilder::with_parts(
        &project.root,
        &config,
        ResolutionTable::default(),
        Box::new(NoSystemLocator),
        Box::new(FsReader),
    )
    .unwrap()
    .build("main.tex")
    .unwrap();
    assert_eq!(files(&graph), vec!["main.tex"]);
    assert_eq!(graph.nodes().len(), 3);
    assert_eq!(graph.nodes()[1].file.origin, Origin::External);
}

#[test]
fn test_resolve_project_with_config_only() {
    let project = Project::new(&[("main.tex", r"\input{a}"), ("a.tex", r"\input{b}"), ("b.tex", "")]);
    let config = ResolveConfig {
        system_lookup: texpack_resolve::SystemLookup::None,
        ..ResolveConfig::default()
    };
    let graph = texpack_resolve::resolve_project(&project.root, "main.tex", &config).unwrap();
    assert_eq!(files(&graph), vec!["main.tex", "a.tex", "b.tex"]);
    assert!(graph.warnings().is_empty());
}

#[test]
fn test_fallback_file_is_scanned_when_named_later() {
    let project = Project::new(&[
        ("main.tex", "\\input{chapters/ch\\x}\n\\input{chapters/ch1}"),
        ("chapters/ch1.tex", r"\input{figs-table}"),
        ("figs-table.tex", ""),
    ]);
    let graph = project.resolve();
    assert_eq!(
        files(&graph),
        vec!["main.tex", "chapters/ch1.tex", "figs-table.tex"]
    );
    let warnings = graph.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].reason, WarningReason::Unparseable);
    assert!(graph.nodes().iter().all(|n| n.scanned));
}

#[test]
fn test_bare_input_ended_by_relax_is_scanned() {
    let project = Project::new(&[
        ("main.tex", "\\input intro.tex\\relax\n"),
        ("intro.tex", r"\input{details}"),
        ("details.tex", ""),
    ]);
    let graph = project.resolve();
    assert_eq!(files(&graph), vec!["main.tex", "intro.tex", "details.tex"]);
    assert!(graph.warnings().is_empty());
}
