//! Build command implementation.
//!
//! Loads options, discovers stylesheets and runs the sprite pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::discovery::{discover, MissingAssetPolicy, SpriteOptions};
use crate::error::Result;
use crate::output::{plural, Printer};
use crate::pack::Algorithm;
use crate::pipeline::{Inline, Pipeline, RayonSpawner, RunSummary, Spawner};

/// Pack tagged images into sheets and rewrite the stylesheets
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Stylesheets or directories (comma-separated lists allowed)
    pub src: Vec<String>,

    /// Where rewritten stylesheets go (file or directory)
    #[arg(long, short)]
    pub dest: Option<PathBuf>,

    /// Directory for generated sheets
    #[arg(long, short, visible_alias = "dest-img")]
    pub output: Option<PathBuf>,

    /// Url prefix for sheets in rewritten declarations
    #[arg(long)]
    pub img_path: Option<String>,

    /// Sheet file name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Skip the double-density sheet and media block
    #[arg(long)]
    pub no_retina: bool,

    /// Packing strategy
    #[arg(long, value_enum)]
    pub algorithm: Option<Algorithm>,

    /// Pixels between packed images
    #[arg(long)]
    pub padding: Option<u32>,

    /// Media query for the high-density block
    #[arg(long)]
    pub media: Option<String>,

    /// Largest image (bytes) embedded by the `inline` tag; 0 disables
    #[arg(long)]
    pub size_limit: Option<u64>,

    /// What to do when a tagged image does not exist
    #[arg(long, value_enum)]
    pub missing_assets: Option<MissingAssetPolicy>,

    /// Config file (default: ./sprite.yaml when present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Run every stage on the calling thread
    #[arg(long)]
    pub sequential: bool,
}

impl BuildArgs {
    /// Apply command-line overrides on top of loaded options.
    pub fn apply(&self, options: &mut SpriteOptions) {
        super::apply_sources(options, &self.src);
        if let Some(dest) = &self.dest {
            options.dest = dest.clone();
        }
        if let Some(output) = &self.output {
            options.output = output.clone();
        }
        if let Some(img_path) = &self.img_path {
            options.img_path = img_path.clone();
        }
        if let Some(prefix) = &self.prefix {
            options.prefix = prefix.clone();
        }
        if self.no_retina {
            options.retina = false;
        }
        if let Some(algorithm) = self.algorithm {
            options.algorithm = algorithm;
        }
        if let Some(padding) = self.padding {
            options.padding = padding;
        }
        if let Some(media) = &self.media {
            options.media = media.clone();
        }
        if let Some(size_limit) = self.size_limit {
            options.size_limit = size_limit;
        }
        if let Some(policy) = self.missing_assets {
            options.missing_assets = policy;
        }
    }
}

pub fn run(args: BuildArgs, printer: &Printer) -> Result<RunSummary> {
    let mut options = super::load_options(args.config.as_deref())?;
    args.apply(&mut options);
    options.validate()?;

    let sources = discover(&options)?;
    printer.status(
        "Scanning",
        &plural(sources.len(), "stylesheet", "stylesheets"),
    );
    printer.info(
        "Packing",
        &format!("{} with padding {}", options.algorithm, options.padding),
    );

    let spawner: Arc<dyn Spawner> = if args.sequential {
        Arc::new(Inline)
    } else {
        Arc::new(RayonSpawner)
    };

    Pipeline::new(options, sources)
        .with_spawner(spawner)
        .with_reporter(Arc::new(*printer))
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba, RgbaImage};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_apply_overrides() {
        let args = BuildArgs {
            src: vec!["a.css".to_string()],
            prefix: Some("s-".to_string()),
            no_retina: true,
            padding: Some(0),
            algorithm: Some(Algorithm::LeftRight),
            ..Default::default()
        };
        let mut options = SpriteOptions::default();
        args.apply(&mut options);

        assert_eq!(options.src, vec![PathBuf::from("a.css")]);
        assert_eq!(options.prefix, "s-");
        assert!(!options.retina);
        assert_eq!(options.padding, 0);
        assert_eq!(options.algorithm, Algorithm::LeftRight);
        // untouched
        assert_eq!(options.img_path, "../images/");
    }

    #[test]
    fn test_build_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::create_dir_all(dir.path().join("img")).unwrap();
        let img: RgbaImage = ImageBuffer::from_pixel(8, 8, Rgba([0, 0, 255, 255]));
        img.save(dir.path().join("img/a.png")).unwrap();
        fs::write(
            dir.path().join("css/site.css"),
            ".a { background: url(../img/a.png?__icons) }",
        )
        .unwrap();
        let config = dir.path().join("sprite.yaml");
        fs::write(&config, "").unwrap();

        let args = BuildArgs {
            src: vec![dir.path().join("css").display().to_string()],
            dest: Some(dir.path().join("out/")),
            output: Some(dir.path().join("images")),
            config: Some(config),
            sequential: true,
            ..Default::default()
        };
        let summary = run(args, &Printer::new()).unwrap();

        assert_eq!(summary.groups, 1);
        assert!(dir.path().join("images/sprite-icons.png").exists());
        assert!(dir.path().join("images/sprite-icons@2x.png").exists());
        assert_eq!(summary.stylesheets, vec![dir.path().join("out/site.css")]);
        let text = fs::read_to_string(dir.path().join("out/site.css")).unwrap();
        assert!(text.contains("url(../images/sprite-icons.png)"));
        assert!(text.contains("@media only screen"));
    }
}
