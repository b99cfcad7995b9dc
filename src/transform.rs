//! Replacement of Mermaid code blocks with rendered images.

use crate::config::Config;
use crate::error::FilterError;
use crate::fallback::has_foreign_object;
use crate::format::{ImageFormat, OutputTarget, select_format};
use crate::naming::AssetPaths;
use crate::pandoc::{Attr, Block, CodeBlock, Inline, NodeFilter, Target, extract_caption};
use crate::renderer::{RenderRequest, Renderer};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Class that marks a code block as a Mermaid diagram.
pub const MERMAID_CLASS: &str = "mermaid";

/// Turns `mermaid` code blocks into image paragraphs.
///
/// Asset paths in the emitted nodes are relative to `work_dir`, which is
/// also where files are written and where the renderer runs.
pub struct DiagramTransformer<R> {
    config: Config,
    renderer: R,
    work_dir: PathBuf,
}

impl<R: Renderer> DiagramTransformer<R> {
    pub fn new(config: Config, renderer: R, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            renderer,
            work_dir: work_dir.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Render `block` if it is a Mermaid diagram.
    ///
    /// Returns `Ok(None)` for any other code block, without touching the disk.
    pub fn transform(&self, block: &CodeBlock, target: &OutputTarget) -> Result<Option<Vec<Block>>, FilterError> {
        let attr = block.attr();
        if !attr.has_class(MERMAID_CLASS) {
            return Ok(None);
        }

        let (caption, key_values) = extract_caption(attr.key_values());
        let paths = AssetPaths::derive(&self.config.image_prefix, block.text());
        let format = select_format(&self.config, target);

        self.write_source(&paths, block.text())?;

        let primary = paths.image(format);
        if self.render_if_missing(&paths, &primary, format)? {
            log::info!("Created image {}", primary.display());
        }

        let mut dest = primary;
        if self.needs_pdf_fallback(format, target, &dest) {
            let fallback = paths.image(ImageFormat::Pdf);
            if self.render_if_missing(&paths, &fallback, ImageFormat::Pdf)? {
                log::info!(
                    "Created PDF fallback image {} (foreignObject detected)",
                    fallback.display()
                );
            }
            dest = fallback;
        }

        let image = Inline::Image(
            Attr(attr.identifier().to_string(), Vec::new(), key_values),
            caption.map(Inline::Str).into_iter().collect(),
            Target(dest.to_string_lossy().into_owned(), format.extension().to_string()),
        );
        Ok(Some(vec![Block::Para(vec![image])]))
    }

    /// Always rewrite the source so it matches the current document.
    fn write_source(&self, paths: &AssetPaths, text: &str) -> Result<(), FilterError> {
        let dir = self.work_dir.join(paths.dir());
        if !dir.is_dir() {
            fs::create_dir_all(&dir).map_err(|e| FilterError::io(&dir, e))?;
            log::info!("Created directory {}", paths.dir().display());
        }

        let source = self.work_dir.join(paths.source());
        fs::write(&source, text).map_err(|e| FilterError::io(&source, e))
    }

    /// Returns whether a render happened.
    fn render_if_missing(&self, paths: &AssetPaths, dest: &Path, format: ImageFormat) -> Result<bool, FilterError> {
        if self.work_dir.join(dest).is_file() {
            log::debug!("Reusing cached image {}", dest.display());
            return Ok(false);
        }

        self.renderer.render(&RenderRequest {
            source: paths.source(),
            dest: dest.to_path_buf(),
            format,
        })?;
        Ok(true)
    }

    fn needs_pdf_fallback(&self, format: ImageFormat, target: &OutputTarget, svg: &Path) -> bool {
        self.config.auto_pdf_fallback
            && format == ImageFormat::Svg
            && target.accepts_pdf_fallback()
            && has_foreign_object(&self.work_dir.join(svg))
    }
}

impl<R: Renderer> NodeFilter for DiagramTransformer<R> {
    fn apply(
        &self,
        kind: &str,
        content: &Value,
        target: &str,
        _meta: &Value,
    ) -> Result<Option<Vec<Value>>, FilterError> {
        if kind != "CodeBlock" {
            return Ok(None);
        }

        let block: CodeBlock = serde_json::from_value(content.clone())
            .map_err(|e| FilterError::Document(format!("unreadable CodeBlock: {e}")))?;

        self.transform(&block, &OutputTarget::from_token(target))?
            .map(|blocks| {
                blocks
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(FilterError::from)
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pandoc::filter_document;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    const FOREIGN_SVG: &str = "<svg><foreignObject><div>A</div></foreignObject></svg>";
    const PLAIN_SVG: &str = "<svg><text>A</text></svg>";

    /// Writes a placeholder image for every request and records it.
    struct FakeRenderer {
        work_dir: PathBuf,
        svg_body: &'static str,
        calls: RefCell<Vec<RenderRequest>>,
    }

    impl FakeRenderer {
        fn new(work_dir: &Path, svg_body: &'static str) -> Self {
            Self {
                work_dir: work_dir.to_path_buf(),
                svg_body,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn formats(&self) -> Vec<ImageFormat> {
            self.calls.borrow().iter().map(|r| r.format).collect()
        }
    }

    impl Renderer for FakeRenderer {
        fn render(&self, request: &RenderRequest) -> Result<(), FilterError> {
            assert!(self.work_dir.join(&request.source).is_file(), "source must exist before rendering");
            let body = match request.format {
                ImageFormat::Svg => self.svg_body,
                ImageFormat::Png => "PNG",
                ImageFormat::Pdf => "%PDF-1.7",
            };
            fs::write(self.work_dir.join(&request.dest), body).unwrap();
            self.calls.borrow_mut().push(request.clone());
            Ok(())
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, _request: &RenderRequest) -> Result<(), FilterError> {
            Err(FilterError::RenderFailed {
                command: "mmdc".to_string(),
                exit_code: Some(3),
                stderr: "Parse error on line 1".to_string(),
            })
        }
    }

    fn transformer(dir: &TempDir, config: Config, svg_body: &'static str) -> DiagramTransformer<FakeRenderer> {
        DiagramTransformer::new(config, FakeRenderer::new(dir.path(), svg_body), dir.path())
    }

    fn mermaid_block(text: &str) -> CodeBlock {
        CodeBlock(
            Attr("flow".to_string(), vec![MERMAID_CLASS.to_string()], Vec::new()),
            text.to_string(),
        )
    }

    fn image_of(blocks: &[Block]) -> (&Attr, &Vec<Inline>, &Target) {
        match blocks {
            [Block::Para(inlines)] => match inlines.as_slice() {
                [Inline::Image(attr, caption, target)] => (attr, caption, target),
                other => panic!("expected a single image, got {other:?}"),
            },
            other => panic!("expected a single paragraph, got {other:?}"),
        }
    }

    #[test]
    fn test_non_mermaid_block_is_untouched() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);
        let block = CodeBlock(
            Attr(String::new(), vec!["python".to_string()], Vec::new()),
            "print(1)".to_string(),
        );

        for token in ["", "html", "latex", "pdf", "docx"] {
            assert!(t.transform(&block, &OutputTarget::from_token(token)).unwrap().is_none());
        }
        assert!(t.renderer().calls.borrow().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_renders_svg_for_unspecified_target() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);
        let paths = AssetPaths::derive("mermaid", "graph TD; A-->B");

        let blocks = t
            .transform(&mermaid_block("graph TD; A-->B"), &OutputTarget::Unspecified)
            .unwrap()
            .unwrap();
        let (attr, caption, target) = image_of(&blocks);

        assert_eq!(t.renderer().formats(), vec![ImageFormat::Svg]);
        assert_eq!(attr, &Attr("flow".to_string(), vec![], vec![]));
        assert!(caption.is_empty());
        assert_eq!(target.0, paths.image(ImageFormat::Svg).to_string_lossy());
        assert_eq!(target.1, "svg");
        assert_eq!(
            fs::read_to_string(dir.path().join(paths.source())).unwrap(),
            "graph TD; A-->B"
        );
    }

    #[test]
    fn test_cached_image_skips_renderer_but_rewrites_source() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);
        let block = mermaid_block("graph LR; X-->Y");
        let source = dir.path().join(AssetPaths::derive("mermaid", block.text()).source());

        let first = t.transform(&block, &OutputTarget::Web).unwrap();
        fs::write(&source, "stale").unwrap();
        let second = t.transform(&block, &OutputTarget::Web).unwrap();

        assert_eq!(first, second);
        assert_eq!(t.renderer().calls.borrow().len(), 1);
        assert_eq!(fs::read_to_string(&source).unwrap(), "graph LR; X-->Y");
    }

    #[test]
    fn test_pdf_fallback_on_foreign_object() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), FOREIGN_SVG);
        let paths = AssetPaths::derive("mermaid", "graph TD; A-->B");

        let blocks = t
            .transform(&mermaid_block("graph TD; A-->B"), &OutputTarget::Pdf)
            .unwrap()
            .unwrap();
        let (_, _, target) = image_of(&blocks);

        assert_eq!(t.renderer().formats(), vec![ImageFormat::Svg, ImageFormat::Pdf]);
        assert_eq!(target.0, paths.image(ImageFormat::Pdf).to_string_lossy());
        assert_eq!(target.1, "svg");
        assert!(dir.path().join(paths.image(ImageFormat::Svg)).is_file());
    }

    #[test]
    fn test_pdf_fallback_is_cached_too() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), FOREIGN_SVG);
        let block = mermaid_block("graph TD; A-->B");

        t.transform(&block, &OutputTarget::Latex).unwrap();
        t.transform(&block, &OutputTarget::Latex).unwrap();

        assert_eq!(t.renderer().formats(), vec![ImageFormat::Svg, ImageFormat::Pdf]);
    }

    #[test]
    fn test_no_fallback_without_marker() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);

        let blocks = t
            .transform(&mermaid_block("graph TD; A-->B"), &OutputTarget::Pdf)
            .unwrap()
            .unwrap();

        let (_, _, target) = image_of(&blocks);

        assert_eq!(t.renderer().formats(), vec![ImageFormat::Svg]);
        assert!(target.0.ends_with(".svg"));
    }

    #[test]
    fn test_no_fallback_for_web_target() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), FOREIGN_SVG);

        t.transform(&mermaid_block("graph TD; A-->B"), &OutputTarget::Web).unwrap();
        assert_eq!(t.renderer().formats(), vec![ImageFormat::Svg]);
    }

    #[test]
    fn test_no_fallback_when_disabled() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            auto_pdf_fallback: false,
            ..Config::default()
        };
        let t = transformer(&dir, config, FOREIGN_SVG);

        t.transform(&mermaid_block("graph TD; A-->B"), &OutputTarget::Pdf).unwrap();
        assert_eq!(t.renderer().formats(), vec![ImageFormat::Svg]);
    }

    #[test]
    fn test_forced_raster_format() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            force_format: Some(ImageFormat::Png),
            ..Config::default()
        };
        let t = transformer(&dir, config, FOREIGN_SVG);

        let blocks = t
            .transform(&mermaid_block("graph TD; A-->B"), &OutputTarget::Pdf)
            .unwrap()
            .unwrap();
        let (_, _, target) = image_of(&blocks);

        assert_eq!(t.renderer().formats(), vec![ImageFormat::Png]);
        assert!(target.0.ends_with(".png"));
        assert_eq!(target.1, "png");
    }

    #[test]
    fn test_caption_and_attributes() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);
        let block = CodeBlock(
            Attr(
                "fig-flow".to_string(),
                vec!["mermaid".to_string(), "wide".to_string()],
                vec![
                    ("caption".to_string(), "A flow".to_string()),
                    ("width".to_string(), "80%".to_string()),
                ],
            ),
            "graph TD; A-->B".to_string(),
        );

        let blocks = t.transform(&block, &OutputTarget::Web).unwrap().unwrap();
        let (attr, caption, target) = image_of(&blocks);

        // A caption does not turn the title into a "fig:" marker
        assert_eq!(target.1, "svg");
        assert_eq!(
            attr,
            &Attr(
                "fig-flow".to_string(),
                vec![],
                vec![("width".to_string(), "80%".to_string())]
            )
        );
        assert_eq!(caption, &vec![Inline::Str("A flow".to_string())]);
    }

    #[test]
    fn test_empty_diagram_text() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);
        let paths = AssetPaths::derive("mermaid", "");

        t.transform(&mermaid_block(""), &OutputTarget::Web).unwrap();

        let source = dir.path().join(paths.source());
        assert!(source.is_file());
        assert_eq!(fs::metadata(&source).unwrap().len(), 0);
    }

    #[test]
    fn test_custom_prefix() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            image_prefix: "diagrams".to_string(),
            ..Config::default()
        };
        let t = transformer(&dir, config, PLAIN_SVG);

        let blocks = t
            .transform(&mermaid_block("graph TD; A-->B"), &OutputTarget::Web)
            .unwrap()
            .unwrap();

        let (_, _, target) = image_of(&blocks);

        assert!(target.0.starts_with("diagrams-images"));
        assert!(dir.path().join("diagrams-images").is_dir());
    }

    #[test]
    fn test_renderer_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let t = DiagramTransformer::new(Config::default(), FailingRenderer, dir.path());

        let err = t
            .transform(&mermaid_block("graph TD; A-->"), &OutputTarget::Web)
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_filters_whole_document() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);
        let paths = AssetPaths::derive("mermaid", "graph TD; A-->B");
        let svg = paths.image(ImageFormat::Svg).to_string_lossy().into_owned();

        let doc = json!({
            "pandoc-api-version": [1, 23, 1],
            "meta": {},
            "blocks": [
                {"t": "CodeBlock", "c": [["", ["python"], []], "print(1)"]},
                {"t": "CodeBlock", "c": [["d1", ["mermaid"], [["caption", "Flow"]]], "graph TD; A-->B"]}
            ]
        });

        let out = filter_document(doc, &t, "html").unwrap();
        assert_eq!(
            out["blocks"],
            json!([
                {"t": "CodeBlock", "c": [["", ["python"], []], "print(1)"]},
                {"t": "Para", "c": [{"t": "Image", "c": [
                    ["d1", [], []],
                    [{"t": "Str", "c": "Flow"}],
                    [svg, "svg"]
                ]}]}
            ])
        );
    }

    #[test]
    fn test_malformed_code_block() {
        let dir = TempDir::new().unwrap();
        let t = transformer(&dir, Config::default(), PLAIN_SVG);

        let result = t.apply("CodeBlock", &json!(["not", "a", "block"]), "", &json!({}));
        assert!(matches!(result, Err(FilterError::Document(_))));
    }
}
