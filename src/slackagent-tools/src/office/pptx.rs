//! Presentation generation.
//!
//! Every slide uses one blank layout and carries its own text boxes, so
//! the master and layout parts stay minimal.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use slackagent_protocol::GeneratedFile;

use super::{PPTX_MIME, Package, content_types, relationships, root_rels, xml_escape};
use crate::error::{ToolError, ToolResult};
use crate::file_name::sanitize_file_name;
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

const MAX_SLIDES: usize = 100;

const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

// EMU, 16:9.
const SLIDE_CX: u64 = 12_192_000;
const SLIDE_CY: u64 = 6_858_000;

/// One slide: a title and bullet points.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlideSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PowerPointArgs {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    slides: Vec<SlideSpec>,
}

/// Build a `.pptx`. A non-blank `title` adds a title slide in front.
pub fn build_presentation(title: Option<&str>, slides: &[SlideSpec]) -> ToolResult<Vec<u8>> {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    let total = slides.len() + usize::from(title.is_some());
    if total == 0 {
        return Err(ToolError::InvalidArguments(
            "the presentation needs a title or at least one slide".to_string(),
        ));
    }
    if total > MAX_SLIDES {
        return Err(ToolError::InvalidArguments(format!(
            "at most {MAX_SLIDES} slides are supported, got {total}"
        )));
    }

    let mut rendered = Vec::with_capacity(total);
    if let Some(title) = title {
        rendered.push(title_slide_xml(title));
    }
    rendered.extend(slides.iter().map(content_slide_xml));

    let mut package = Package::new();

    let mut overrides = vec![
        (
            "/ppt/presentation.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml",
        ),
        (
            "/ppt/slideMasters/slideMaster1.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml",
        ),
        (
            "/ppt/slideLayouts/slideLayout1.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml",
        ),
        (
            "/ppt/theme/theme1.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.theme+xml",
        ),
    ];
    for i in 1..=total {
        overrides.push((
            format!("/ppt/slides/slide{i}.xml"),
            "application/vnd.openxmlformats-officedocument.presentationml.slide+xml",
        ));
    }
    package.add("[Content_Types].xml", &content_types(&overrides))?;
    package.add("_rels/.rels", &root_rels("ppt/presentation.xml"))?;

    package.add("ppt/presentation.xml", &presentation_xml(total))?;
    let master_rel = format!("{REL_BASE}/slideMaster");
    let slide_rel = format!("{REL_BASE}/slide");
    let theme_rel = format!("{REL_BASE}/theme");
    let layout_rel = format!("{REL_BASE}/slideLayout");

    let slide_ids: Vec<(String, String)> = (1..=total)
        .map(|i| (format!("rId{}", i + 1), format!("slides/slide{i}.xml")))
        .collect();
    let theme_id = format!("rId{}", total + 2);
    let mut entries: Vec<(&str, &str, &str)> =
        vec![("rId1", master_rel.as_str(), "slideMasters/slideMaster1.xml")];
    entries.extend(
        slide_ids
            .iter()
            .map(|(id, target)| (id.as_str(), slide_rel.as_str(), target.as_str())),
    );
    entries.push((theme_id.as_str(), theme_rel.as_str(), "theme/theme1.xml"));
    package.add("ppt/_rels/presentation.xml.rels", &relationships(&entries))?;

    package.add("ppt/slideMasters/slideMaster1.xml", &master_xml())?;
    package.add(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &relationships(&[
            ("rId1", layout_rel.as_str(), "../slideLayouts/slideLayout1.xml"),
            ("rId2", theme_rel.as_str(), "../theme/theme1.xml"),
        ]),
    )?;
    package.add("ppt/slideLayouts/slideLayout1.xml", &layout_xml())?;
    package.add(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &relationships(&[("rId1", master_rel.as_str(), "../slideMasters/slideMaster1.xml")]),
    )?;
    package.add("ppt/theme/theme1.xml", THEME_XML)?;

    for (i, slide) in rendered.iter().enumerate() {
        let n = i + 1;
        package.add(&format!("ppt/slides/slide{n}.xml"), slide)?;
        package.add(
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            &relationships(&[("rId1", layout_rel.as_str(), "../slideLayouts/slideLayout1.xml")]),
        )?;
    }

    package.finish()
}

fn presentation_xml(slides: usize) -> String {
    let ids: String = (1..=slides)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + i, i + 1))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{SLIDE_CX}" cy="{SLIDE_CY}"/><p:notesSz cx="{SLIDE_CY}" cy="{SLIDE_CX}"/></p:presentation>"#
    )
}

fn empty_tree() -> &'static str {
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
}

fn master_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}"><p:cSld><p:spTree>{}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#,
        empty_tree()
    )
}

fn layout_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        empty_tree()
    )
}

/// A text box at the given position; each entry of `paragraphs` is one line.
fn text_box(
    id: u32,
    name: &str,
    (x, y, cx, cy): (u64, u64, u64, u64),
    size: u32,
    bold: bool,
    paragraphs: &[String],
) -> String {
    let bold = if bold { r#" b="1""# } else { "" };
    let body: String = if paragraphs.is_empty() {
        "<a:p/>".to_string()
    } else {
        paragraphs
            .iter()
            .map(|text| {
                format!(
                    r#"<a:p><a:r><a:rPr lang="en-US" sz="{size}"{bold}/><a:t>{}</a:t></a:r></a:p>"#,
                    xml_escape(text)
                )
            })
            .collect()
    };
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="square"><a:normAutofit/></a:bodyPr><a:lstStyle/>{body}</p:txBody></p:sp>"#
    )
}

fn slide_xml(shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="{A_NS}" xmlns:r="{R_NS}" xmlns:p="{P_NS}"><p:cSld><p:spTree>{}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        empty_tree()
    )
}

fn title_slide_xml(title: &str) -> String {
    slide_xml(&text_box(
        2,
        "Title",
        (838_200, 2_286_000, 10_515_600, 1_600_200),
        4400,
        true,
        &[title.to_string()],
    ))
}

fn content_slide_xml(slide: &SlideSpec) -> String {
    let bullets: Vec<String> = slide
        .bullets
        .iter()
        .map(|b| format!("• {}", b.trim()))
        .collect();
    let mut shapes = text_box(
        2,
        "Title",
        (838_200, 365_125, 10_515_600, 1_325_563),
        3600,
        true,
        &[slide.title.trim().to_string()],
    );
    shapes.push_str(&text_box(
        3,
        "Content",
        (838_200, 1_825_625, 10_515_600, 4_351_338),
        2000,
        false,
        &bullets,
    ));
    slide_xml(&shapes)
}

/// `generate_powerpoint`.
#[derive(Debug, Default)]
pub struct PowerPointTool;

impl PowerPointTool {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: Value, state: &InvocationState) -> ToolResult<String> {
        let args: PowerPointArgs = parse_args(args)?;
        let bytes = build_presentation(args.title.as_deref(), &args.slides)?;
        let file_name = sanitize_file_name(&args.file_name, "pptx", "presentation");

        let has_title = args.title.as_deref().is_some_and(|t| !t.trim().is_empty());
        let count = args.slides.len() + usize::from(has_title);
        let description = format!("PowerPoint presentation with {count} slide(s)");
        state.store(GeneratedFile::new(bytes, &file_name, PPTX_MIME, &description));
        Ok(format!(
            "Created {file_name}: {description}. It will be attached to the reply."
        ))
    }
}

#[async_trait]
impl Tool for PowerPointTool {
    fn name(&self) -> &str {
        crate::names::GENERATE_POWERPOINT
    }

    fn description(&self) -> &str {
        "Create a PowerPoint (.pptx) presentation. Each slide has a title and bullet points; an optional presentation title adds a title slide. The file is attached to the reply."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string", "description": "File name, e.g. roadmap.pptx"},
                "title": {"type": "string"},
                "slides": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string"},
                            "bullets": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["title"]
                    }
                }
            },
            "required": ["file_name", "slides"]
        })
    }

    async fn invoke(&self, args: Value, state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args, state))
    }
}

const THEME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Plain"><a:themeElements><a:clrScheme name="Plain"><a:dk1><a:srgbClr val="000000"/></a:dk1><a:lt1><a:srgbClr val="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F2937"/></a:dk2><a:lt2><a:srgbClr val="F3F4F6"/></a:lt2><a:accent1><a:srgbClr val="2563EB"/></a:accent1><a:accent2><a:srgbClr val="DC2626"/></a:accent2><a:accent3><a:srgbClr val="16A34A"/></a:accent3><a:accent4><a:srgbClr val="D97706"/></a:accent4><a:accent5><a:srgbClr val="7C3AED"/></a:accent5><a:accent6><a:srgbClr val="0891B2"/></a:accent6><a:hlink><a:srgbClr val="2563EB"/></a:hlink><a:folHlink><a:srgbClr val="7C3AED"/></a:folHlink></a:clrScheme><a:fontScheme name="Plain"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Plain"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::office::test_support::{part_names, read_part};

    fn slide(title: &str, bullets: &[&str]) -> SlideSpec {
        SlideSpec {
            title: title.to_string(),
            bullets: bullets.iter().map(|b| b.to_string()).collect(),
        }
    }

    #[test]
    fn test_title_slide_comes_first() {
        let bytes = build_presentation(
            Some("Roadmap"),
            &[slide("Q1", &["ship A", "hire B"]), slide("Q2", &[])],
        )
        .unwrap();

        let names = part_names(&bytes);
        for part in [
            "ppt/presentation.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide3.xml",
            "ppt/slides/_rels/slide3.xml.rels",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
        ] {
            assert!(names.contains(&part.to_string()), "missing {part}");
        }
        assert!(!names.contains(&"ppt/slides/slide4.xml".to_string()));

        assert!(read_part(&bytes, "ppt/slides/slide1.xml").contains("Roadmap"));
        let second = read_part(&bytes, "ppt/slides/slide2.xml");
        assert!(second.contains("<a:t>Q1</a:t>"));
        assert!(second.contains("<a:t>• hire B</a:t>"));

        let presentation = read_part(&bytes, "ppt/presentation.xml");
        assert_eq!(presentation.matches("<p:sldId ").count(), 3);
        let rels = read_part(&bytes, "ppt/_rels/presentation.xml.rels");
        assert!(rels.contains(r#"Id="rId5""#));
        assert!(rels.contains("theme/theme1.xml"));
    }

    #[test]
    fn test_empty_presentation_rejected() {
        assert!(build_presentation(Some("  "), &[]).is_err());
    }

    #[tokio::test]
    async fn test_tool_stores_file() {
        let state = InvocationState::new();
        let output = PowerPointTool::new()
            .invoke(
                json!({"file_name": "deck.pptx", "slides": [{"title": "Intro", "bullets": ["a & b"]}]}),
                &state,
            )
            .await;
        assert!(!output.is_error, "{}", output.text);

        let file = state.take().unwrap();
        assert_eq!(file.file_name, "deck.pptx");
        assert_eq!(file.mime_type, PPTX_MIME);
        assert!(read_part(&file.file_bytes, "ppt/slides/slide1.xml").contains("a &amp; b"));
    }
}
