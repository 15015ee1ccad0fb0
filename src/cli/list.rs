//! List command implementation.
//!
//! Extracts tagged references and prints the sprite groups they would
//! form. Nothing is packed or written.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::css::parse_stylesheet;
use crate::discovery::{discover, SpriteOptions};
use crate::error::{Result, SpriteError};
use crate::output::{display_path, plural, Printer};
use crate::sprite::{group_records, DeclarationExtractor, SpriteGroup};

/// Show sprite groups without writing anything
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Stylesheets or directories (default: `src` from sprite.yaml)
    pub src: Vec<String>,

    /// Config file (default: ./sprite.yaml when present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

pub fn run(args: ListArgs, printer: &Printer) -> Result<()> {
    let mut options = super::load_options(args.config.as_deref())?;
    super::apply_sources(&mut options, &args.src);

    let groups = collect_groups(&options, printer)?;
    if groups.is_empty() {
        printer.info("Empty", "no tagged background images found");
        return Ok(());
    }

    for group in groups.values() {
        let images: Vec<String> = group
            .unique_paths()
            .iter()
            .map(|p| display_path(p))
            .collect();
        printer.info(
            &group.tag,
            &format!(
                "{} -> {}",
                plural(images.len(), "image", "images"),
                options.sheet_name(&group.tag)
            ),
        );
        for image in images {
            println!("{}\t{}", group.tag, image);
        }
    }

    Ok(())
}

/// Parse and extract every source, sequentially.
fn collect_groups(
    options: &SpriteOptions,
    printer: &Printer,
) -> Result<BTreeMap<String, SpriteGroup>> {
    let extractor = DeclarationExtractor::new(options);
    let mut records = vec![];

    for (id, source) in discover(options)?.into_iter().enumerate() {
        let text = fs::read_to_string(&source).map_err(|e| SpriteError::SourceRead {
            path: source.clone(),
            message: e.to_string(),
        })?;
        let mut tree = parse_stylesheet(&text).map_err(|e| e.in_file(&source))?;
        let found = extractor.extract(id, &source, &mut tree)?;
        for warning in &found.warnings {
            printer.warning("Warning", warning);
        }
        records.extend(found.records);
    }

    Ok(group_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn test_collect_groups_writes_nothing() {
        let dir = tempdir().unwrap();
        let img: RgbaImage = ImageBuffer::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        img.save(dir.path().join("a.png")).unwrap();
        img.save(dir.path().join("b.png")).unwrap();
        fs::write(
            dir.path().join("site.css"),
            ".a { background: url(a.png?__one) }\n.b { background: url(b.png?__two) }\n.c { background: url(a.png?__one) }",
        )
        .unwrap();

        let options = SpriteOptions {
            src: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let groups = collect_groups(&options, &Printer::new()).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["one"].len(), 2);
        assert_eq!(groups["one"].unique_paths().len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_list_reports_parse_errors_with_file() {
        let dir = tempdir().unwrap();
        let css = dir.path().join("broken.css");
        fs::write(&css, ".a { color: red").unwrap();

        let options = SpriteOptions {
            src: vec![css],
            ..Default::default()
        };
        let err = collect_groups(&options, &Printer::new()).unwrap_err();
        match err {
            SpriteError::Parse { message, .. } => assert!(message.contains("broken.css")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
