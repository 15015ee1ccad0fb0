//! The three-stage sprite run: Extract, Pack, Emit.
//!
//! Extract parses every stylesheet and records tagged declarations (one
//! unit per file). Pack builds one sheet per tag, rewrites the tag's
//! declarations and writes the rasters (one unit per tag, counted once per
//! density). Emit serializes every stylesheet (one unit per file). Each
//! stage starts from the continuation of the previous stage's barrier; a
//! terminal barrier waits for the Pack and Emit halves of the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::css::{parse_stylesheet, stringify};
use crate::discovery::SpriteOptions;
use crate::error::{Result, SpriteError};
use crate::output::{Quiet, Reporter};
use crate::pack::raster::{density_name, downscale, write_sheet};
use crate::pack::{ImagePacker, PackRequest, PackedGeometry, Packer};
use crate::sprite::{
    append_density_block, group_records, DeclarationExtractor, DensityRule, ExtractionRecord,
    FileExtraction, FileId, Rewrite, RuleRewriter, SheetRef, SpriteGroup,
};

use super::barrier::StageBarrier;
use super::destination::Destination;
use super::spawn::{RayonSpawner, Spawner};

/// Called once with the summary of a successful run.
pub type CompletionHook = Box<dyn FnOnce(&RunSummary) + Send>;

/// What a successful run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Rewritten stylesheets, sorted.
    pub stylesheets: Vec<PathBuf>,
    /// Sheet rasters, sorted.
    pub sheets: Vec<PathBuf>,
    /// Number of sprite groups packed.
    pub groups: usize,
    /// Tagged references dropped because the image was missing.
    pub dropped: usize,
    /// References embedded as data URIs.
    pub inlined: usize,
}

/// A configured sprite run.
///
/// ```ignore
/// let summary = Pipeline::new(options, sources)
///     .with_reporter(Arc::new(Printer::new()))
///     .run()?;
/// ```
pub struct Pipeline {
    options: SpriteOptions,
    sources: Vec<PathBuf>,
    packer: Arc<dyn Packer>,
    spawner: Arc<dyn Spawner>,
    reporter: Arc<dyn Reporter>,
    on_complete: Option<CompletionHook>,
}

impl Pipeline {
    pub fn new(options: SpriteOptions, sources: Vec<PathBuf>) -> Self {
        Self {
            options,
            sources,
            packer: Arc::new(ImagePacker),
            spawner: Arc::new(RayonSpawner),
            reporter: Arc::new(Quiet),
            on_complete: None,
        }
    }

    pub fn with_packer(mut self, packer: impl Packer + 'static) -> Self {
        self.packer = Arc::new(packer);
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run `hook` after every output has been written.
    pub fn on_complete(mut self, hook: impl FnOnce(&RunSummary) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Run to completion, blocking the calling thread.
    pub fn run(self) -> Result<RunSummary> {
        let (tx, rx) = mpsc::channel();
        self.start(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.recv().map_err(|_| SpriteError::Interrupted)?
    }

    /// Start the run and return; `finish` receives the outcome exactly once.
    pub fn start(self, finish: impl FnOnce(Result<RunSummary>) + Send + 'static) {
        let Pipeline {
            options,
            sources,
            packer,
            spawner,
            reporter,
            on_complete,
        } = self;

        let destination = Destination::classify(&options.dest, sources.len());
        let shared = Arc::new(Shared {
            options,
            destination,
            packer,
            spawner,
            reporter: Arc::clone(&reporter),
        });

        let terminal = StageBarrier::new("pipeline", 2, move |outcome: Result<Vec<Half>>| {
            let result = outcome.map(summarize);
            if let Ok(summary) = &result {
                if let Some(hook) = on_complete {
                    hook(summary);
                }
                reporter.finished(summary);
            }
            finish(result);
        });

        extract_stage(shared, sources, terminal);
    }
}

/// Run-wide context shared by every unit.
struct Shared {
    options: SpriteOptions,
    destination: Destination,
    packer: Arc<dyn Packer>,
    spawner: Arc<dyn Spawner>,
    reporter: Arc<dyn Reporter>,
}

impl Shared {
    fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.spawner.spawn(Box::new(job));
    }
}

/// One stylesheet's tree and the density rules collected for it.
struct FileContext {
    output: PathBuf,
    state: Mutex<FileState>,
}

struct FileState {
    tree: Value,
    density_rules: Vec<DensityRule>,
}

impl FileContext {
    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything Extract produced, shared by Pack and Emit.
struct RunState {
    files: Vec<FileContext>,
    groups: BTreeMap<String, SpriteGroup>,
    dropped: usize,
    inlined: usize,
}

struct Extracted {
    output: PathBuf,
    tree: Value,
    found: FileExtraction,
}

impl RunState {
    fn assemble(mut extracted: Vec<Extracted>) -> Self {
        extracted.sort_by_key(|e| e.found.file);

        let dropped = extracted.iter().map(|e| e.found.dropped.len()).sum();
        let inlined = extracted.iter().map(|e| e.found.inlined).sum();
        let mut records: Vec<ExtractionRecord> = vec![];
        let mut files = Vec::with_capacity(extracted.len());
        for e in extracted {
            records.extend(e.found.records);
            files.push(FileContext {
                output: e.output,
                state: Mutex::new(FileState {
                    tree: e.tree,
                    density_rules: vec![],
                }),
            });
        }

        Self {
            files,
            groups: group_records(records),
            dropped,
            inlined,
        }
    }
}

/// Completion of one half of the run.
enum Half {
    Packed {
        sheets: Vec<PathBuf>,
        groups: usize,
        dropped: usize,
        inlined: usize,
    },
    Emitted(Vec<PathBuf>),
}

fn summarize(halves: Vec<Half>) -> RunSummary {
    let mut summary = RunSummary::default();
    for half in halves {
        match half {
            Half::Packed {
                sheets,
                groups,
                dropped,
                inlined,
            } => {
                summary.sheets = sheets;
                summary.groups = groups;
                summary.dropped = dropped;
                summary.inlined = inlined;
            }
            Half::Emitted(stylesheets) => summary.stylesheets = stylesheets,
        }
    }
    summary
}

/// Fail the terminal barrier on behalf of both halves.
fn abort(terminal: &StageBarrier<Half>, err: SpriteError) {
    terminal.signal(Err(err));
    terminal.abandon(1);
}

fn extract_stage(shared: Arc<Shared>, sources: Vec<PathBuf>, terminal: StageBarrier<Half>) {
    log::debug!("extract: {} stylesheet(s)", sources.len());

    let next = Arc::clone(&shared);
    let barrier = StageBarrier::new(
        "extract",
        sources.len(),
        move |outcome: Result<Vec<Extracted>>| match outcome {
            Ok(extracted) => pack_stage(next, Arc::new(RunState::assemble(extracted)), terminal),
            Err(err) => abort(&terminal, err),
        },
    );

    for (id, source) in sources.into_iter().enumerate() {
        let unit = Arc::clone(&shared);
        let barrier = barrier.clone();
        shared.spawn(move || {
            barrier.signal(extract_file(&unit, id, source));
        });
    }
}

fn extract_file(shared: &Shared, id: FileId, source: PathBuf) -> Result<Extracted> {
    let text = fs::read_to_string(&source).map_err(|e| SpriteError::SourceRead {
        path: source.clone(),
        message: e.to_string(),
    })?;
    let mut tree = parse_stylesheet(&text).map_err(|e| e.in_file(&source))?;
    let found = DeclarationExtractor::new(&shared.options).extract(id, &source, &mut tree)?;
    for warning in &found.warnings {
        shared.reporter.warning(warning);
    }

    Ok(Extracted {
        output: shared.destination.output_path(&source, &shared.options.prefix),
        tree,
        found,
    })
}

fn pack_stage(shared: Arc<Shared>, state: Arc<RunState>, terminal: StageBarrier<Half>) {
    let densities = shared.options.density() as usize;
    log::debug!("pack: {} group(s)", state.groups.len());

    let next = Arc::clone(&shared);
    let next_state = Arc::clone(&state);
    let barrier = StageBarrier::new(
        "pack",
        state.groups.len() * densities,
        move |outcome: Result<Vec<PathBuf>>| match outcome {
            Ok(mut sheets) => {
                sheets.sort();
                terminal.signal(Ok(Half::Packed {
                    sheets,
                    groups: next_state.groups.len(),
                    dropped: next_state.dropped,
                    inlined: next_state.inlined,
                }));
                emit_stage(next, next_state, terminal);
            }
            Err(err) => abort(&terminal, err),
        },
    );

    for tag in state.groups.keys() {
        let unit = Arc::clone(&shared);
        let state = Arc::clone(&state);
        let barrier = barrier.clone();
        let tag = tag.clone();
        shared.spawn(move || pack_group(&unit, &state, &tag, &barrier));
    }
}

/// Pack one group, rewrite its declarations and write its rasters.
///
/// Signals the barrier once per density, or abandons what is left on
/// failure.
fn pack_group(shared: &Shared, state: &RunState, tag: &str, barrier: &StageBarrier<PathBuf>) {
    let densities = shared.options.density();
    let Some(group) = state.groups.get(tag) else {
        barrier.abandon(densities as usize);
        return;
    };

    let request = PackRequest {
        tag: tag.to_string(),
        paths: group.unique_paths(),
        algorithm: shared.options.algorithm,
        padding: shared.options.padding,
    };
    let result = shared
        .packer
        .pack(&request)
        .and_then(|sheet| rewrite_group(shared, state, group, &sheet.geometry).map(|()| sheet));
    let sheet = match result {
        Ok(sheet) => sheet,
        Err(err) => {
            barrier.signal(Err(err));
            if densities > 1 {
                barrier.abandon(densities as usize - 1);
            }
            return;
        }
    };

    let name = shared.options.sheet_name(tag);
    let base = shared.options.output.join(&name);
    if densities > 1 {
        let full = shared.options.output.join(density_name(&name, densities));
        barrier.signal(write_raster(shared, &sheet.image, full));
        barrier.signal(write_raster(shared, &downscale(&sheet.image, densities), base));
    } else {
        barrier.signal(write_raster(shared, &sheet.image, base));
    }
}

fn rewrite_group(
    shared: &Shared,
    state: &RunState,
    group: &SpriteGroup,
    geometry: &PackedGeometry,
) -> Result<()> {
    let rewriter = RuleRewriter::new(&shared.options);
    let sheet = SheetRef {
        tag: &group.tag,
        geometry,
        density: shared.options.density(),
    };

    for record in &group.records {
        let Some(file) = state.files.get(record.file) else {
            continue;
        };
        let mut file_state = file.lock();
        match rewriter.rewrite(&mut file_state.tree, record, &sheet)? {
            Rewrite::Applied {
                density: Some(rule),
            } => file_state.density_rules.push(rule),
            Rewrite::Applied { density: None } => {}
            Rewrite::Vanished => shared.reporter.warning(&format!(
                "{} in {} was removed before it could be rewritten",
                record.property,
                file.output.display()
            )),
        }
    }
    Ok(())
}

fn write_raster(shared: &Shared, image: &image::RgbaImage, path: PathBuf) -> Result<PathBuf> {
    write_sheet(image, &path)?;
    shared.reporter.written(&path);
    Ok(path)
}

fn emit_stage(shared: Arc<Shared>, state: Arc<RunState>, terminal: StageBarrier<Half>) {
    log::debug!("emit: {} stylesheet(s)", state.files.len());

    let barrier = StageBarrier::new(
        "emit",
        state.files.len(),
        move |outcome: Result<Vec<PathBuf>>| {
            terminal.signal(outcome.map(|mut paths| {
                paths.sort();
                Half::Emitted(paths)
            }));
        },
    );

    for id in 0..state.files.len() {
        let unit = Arc::clone(&shared);
        let state = Arc::clone(&state);
        let barrier = barrier.clone();
        shared.spawn(move || {
            barrier.signal(emit_file(&unit, &state.files[id]));
        });
    }
}

fn emit_file(shared: &Shared, file: &FileContext) -> Result<PathBuf> {
    let text = {
        let mut file_state = file.lock();
        if shared.options.retina {
            let rules = std::mem::take(&mut file_state.density_rules);
            append_density_block(&mut file_state.tree, &shared.options.media, rules);
        }
        stringify(&file_state.tree)
    };

    if let Some(parent) = file.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SpriteError::CssWrite {
            path: file.output.clone(),
            message: e.to_string(),
        })?;
    }
    fs::write(&file.output, text).map_err(|e| SpriteError::CssWrite {
        path: file.output.clone(),
        message: e.to_string(),
    })?;

    shared.reporter.written(&file.output);
    Ok(file.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{compose, Algorithm, PackedSheet};
    use crate::pipeline::Inline;
    use image::{ImageBuffer, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Packs blank images, recording how many paths each request carried.
    #[derive(Clone, Default)]
    struct CountingPacker {
        requests: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl Packer for CountingPacker {
        fn pack(&self, request: &PackRequest) -> Result<PackedSheet> {
            self.requests
                .lock()
                .unwrap()
                .push((request.tag.clone(), request.paths.len()));
            let images = request
                .paths
                .iter()
                .map(|_| ImageBuffer::from_pixel(10, 10, Rgba([0, 0, 0, 255])))
                .collect();
            Ok(compose(request, images))
        }
    }

    struct FailingPacker;

    impl Packer for FailingPacker {
        fn pack(&self, request: &PackRequest) -> Result<PackedSheet> {
            Err(SpriteError::Packing {
                tag: request.tag.clone(),
                message: "broken".to_string(),
            })
        }
    }

    struct Site {
        temp: TempDir,
    }

    impl Site {
        fn new(images: &[&str]) -> Self {
            let temp = TempDir::new().unwrap();
            for dir in ["css", "img", "out/css", "out/images"] {
                fs::create_dir_all(temp.path().join(dir)).unwrap();
            }
            for name in images {
                let img: RgbaImage = ImageBuffer::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
                img.save(temp.path().join("img").join(name)).unwrap();
            }
            Self { temp }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp.path().join(rel)
        }

        fn stylesheet(&self, name: &str, text: &str) -> PathBuf {
            let path = self.path("css").join(name);
            fs::write(&path, text).unwrap();
            path
        }

        fn options(&self, retina: bool) -> SpriteOptions {
            SpriteOptions {
                dest: self.path("out/css/"),
                output: self.path("out/images"),
                retina,
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_end_to_end_without_retina() {
        let site = Site::new(&["a.png", "b.png"]);
        let css = site.stylesheet(
            "site.css",
            ".a { background: url(../img/a.png?__set) #fff; }\n.b { background: url(../img/b.png?__set); }",
        );

        let summary = Pipeline::new(site.options(false), vec![css])
            .with_spawner(Arc::new(Inline))
            .run()
            .unwrap();

        let sheet = site.path("out/images/sprite-set.png");
        assert_eq!(summary.sheets, vec![sheet.clone()]);
        assert_eq!(summary.stylesheets, vec![site.path("out/css/site.css")]);
        assert_eq!(summary.groups, 1);

        // two 10px squares with 10px padding, packed side by side
        let packed = image::open(&sheet).unwrap();
        assert_eq!((packed.width(), packed.height()), (30, 10));

        let output = fs::read_to_string(site.path("out/css/site.css")).unwrap();
        assert_eq!(
            output,
            "\
.a {
  background: #fff url(../images/sprite-set.png) 0px 0px no-repeat;
  background-size: 30px 10px;
}

.b {
  background: url(../images/sprite-set.png) -20px 0px no-repeat;
  background-size: 30px 10px;
}"
        );
    }

    #[test]
    fn test_end_to_end_retina() {
        let site = Site::new(&["a.png"]);
        let css = site.stylesheet("icons.css", ".a { background: url(../img/a.png?__set) }");

        let summary = Pipeline::new(site.options(true), vec![css])
            .with_spawner(Arc::new(Inline))
            .run()
            .unwrap();

        assert_eq!(
            summary.sheets,
            vec![
                site.path("out/images/sprite-set.png"),
                site.path("out/images/sprite-set@2x.png"),
            ]
        );
        let small = image::open(site.path("out/images/sprite-set.png")).unwrap();
        assert_eq!((small.width(), small.height()), (5, 5));

        let output = fs::read_to_string(site.path("out/css/icons.css")).unwrap();
        assert_eq!(
            output,
            "\
.a {
  background: url(../images/sprite-set.png) 0px 0px no-repeat;
  background-size: 5px 5px;
}

@media only screen and (-webkit-min-device-pixel-ratio: 1.5) {
  .a {
    background: url(../images/sprite-set@2x.png) 0px 0px no-repeat;
    background-size: 5px 5px;
  }
}"
        );
    }

    #[test]
    fn test_groups_span_files_and_share_one_sheet() {
        let site = Site::new(&["a.png", "b.png"]);
        let one = site.stylesheet(
            "one.css",
            ".a { background: url(../img/a.png?__set) }\n.x { background: url(../img/a.png?__other) }",
        );
        let two = site.stylesheet(
            "two.css",
            ".b { background: url(../img/b.png?__set) }\n.c { background: url(../img/a.png?__set) }",
        );
        let packer = CountingPacker::default();
        let requests = Arc::clone(&packer.requests);

        let summary = Pipeline::new(site.options(false), vec![one, two])
            .with_packer(packer)
            .with_spawner(Arc::new(Inline))
            .run()
            .unwrap();

        let mut seen = requests.lock().unwrap().clone();
        seen.sort();
        // a.png is referenced twice in "set" but packed once
        assert_eq!(seen, vec![("other".to_string(), 1), ("set".to_string(), 2)]);
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.stylesheets.len(), 2);

        let two_out = fs::read_to_string(site.path("out/css/two.css")).unwrap();
        assert!(two_out.contains("url(../images/sprite-set.png)"));
    }

    #[test]
    fn test_duplicate_paths_share_one_placement() {
        let site = Site::new(&["a.png", "b.png"]);
        let css = site.stylesheet(
            "site.css",
            "\
.x { background: url(../img/a.png?__set) }
.y { background: url(../img/b.png?__set) }
.z { background: url(../img/a.png?__set) }",
        );
        let options = SpriteOptions {
            algorithm: Algorithm::TopDown,
            ..site.options(false)
        };

        Pipeline::new(options, vec![css])
            .with_spawner(Arc::new(Inline))
            .run()
            .unwrap();

        let output = fs::read_to_string(site.path("out/css/site.css")).unwrap();
        assert_eq!(
            output,
            "\
.x {
  background: url(../images/sprite-set.png) 0px 0px no-repeat;
  background-size: 10px 30px;
}

.y {
  background: url(../images/sprite-set.png) 0px -20px no-repeat;
  background-size: 10px 30px;
}

.z {
  background: url(../images/sprite-set.png) 0px 0px no-repeat;
  background-size: 10px 30px;
}"
        );
    }

    #[test]
    fn test_dropped_jobs_report_interrupted() {
        struct Dropping;

        impl Spawner for Dropping {
            fn spawn(&self, _job: crate::pipeline::Job) {}
        }

        let site = Site::new(&["a.png"]);
        let css = site.stylesheet("site.css", ".a { background: url(../img/a.png?__set) }");

        let err = Pipeline::new(site.options(false), vec![css])
            .with_spawner(Arc::new(Dropping))
            .run()
            .unwrap_err();

        assert!(matches!(err, SpriteError::Interrupted));
        assert!(!site.path("out/css/site.css").exists());
    }

    #[test]
    fn test_rayon_spawner_matches_inline() {
        let site = Site::new(&["a.png", "b.png"]);
        let sources: Vec<PathBuf> = (0..4)
            .map(|n| {
                site.stylesheet(
                    &format!("s{}.css", n),
                    ".a { background: url(../img/a.png?__one) }\n.b { background: url(../img/b.png?__two) }",
                )
            })
            .collect();

        let summary = Pipeline::new(site.options(true), sources).run().unwrap();

        assert_eq!(summary.groups, 2);
        assert_eq!(summary.sheets.len(), 4);
        assert_eq!(summary.stylesheets.len(), 4);
        for n in 0..4 {
            let out = fs::read_to_string(site.path(&format!("out/css/s{}.css", n))).unwrap();
            assert!(out.contains("@media"));
        }
    }

    #[test]
    fn test_no_tagged_references_still_emits() {
        let site = Site::new(&[]);
        let css = site.stylesheet("plain.css", ".a { color: red }");

        let summary = Pipeline::new(site.options(true), vec![css])
            .with_spawner(Arc::new(Inline))
            .run()
            .unwrap();

        assert!(summary.sheets.is_empty());
        assert_eq!(summary.groups, 0);
        let out = fs::read_to_string(site.path("out/css/plain.css")).unwrap();
        assert_eq!(out, ".a {\n  color: red;\n}");
    }

    #[test]
    fn test_source_in_dest_gets_prefix() {
        let site = Site::new(&[]);
        let css = site.stylesheet("main.css", ".a { top: 0 }");
        let options = SpriteOptions {
            dest: site.path("css"),
            ..site.options(false)
        };

        let summary = Pipeline::new(options, vec![css.clone()])
            .with_spawner(Arc::new(Inline))
            .run()
            .unwrap();

        assert_eq!(summary.stylesheets, vec![site.path("css/sprite-main.css")]);
        // source untouched
        assert_eq!(fs::read_to_string(css).unwrap(), ".a { top: 0 }");
    }

    #[test]
    fn test_missing_source_fails_run() {
        let site = Site::new(&[]);
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&hook_calls);

        let err = Pipeline::new(site.options(false), vec![site.path("css/none.css")])
            .with_spawner(Arc::new(Inline))
            .on_complete(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .run()
            .unwrap_err();

        assert!(matches!(err, SpriteError::SourceRead { .. }));
        assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
        assert!(!site.path("out/css/none.css").exists());
    }

    #[test]
    fn test_pack_failure_fails_run_and_writes_nothing() {
        let site = Site::new(&["a.png"]);
        let css = site.stylesheet("site.css", ".a { background: url(../img/a.png?__set) }");

        let err = Pipeline::new(site.options(true), vec![css])
            .with_packer(FailingPacker)
            .with_spawner(Arc::new(Inline))
            .run()
            .unwrap_err();

        assert!(matches!(err, SpriteError::Packing { .. }));
        assert!(!site.path("out/css/site.css").exists());
    }

    #[test]
    fn test_completion_hook_sees_summary() {
        let site = Site::new(&["a.png"]);
        let css = site.stylesheet("site.css", ".a { background: url(../img/a.png?__set) }");
        let (tx, rx) = mpsc::channel();

        Pipeline::new(site.options(false), vec![css])
            .with_spawner(Arc::new(Inline))
            .on_complete(move |summary| tx.send(summary.clone()).unwrap())
            .run()
            .unwrap();

        let summary = rx.try_recv().unwrap();
        assert_eq!(summary.sheets, vec![site.path("out/images/sprite-set.png")]);
        assert!(Path::new(&summary.stylesheets[0]).exists());
    }
}
