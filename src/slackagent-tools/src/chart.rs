//! Bar chart rendering to PNG.

use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use serde::Deserialize;
use serde_json::{Value, json};

use slackagent_protocol::GeneratedFile;

use crate::error::{ToolError, ToolResult, ensure_size};
use crate::file_name::sanitize_file_name;
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 500;
const MARGIN: u32 = 50;
const MAX_BARS: usize = 50;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([55, 65, 81]);
const GRID: Rgb<u8> = Rgb([229, 231, 235]);
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([37, 99, 235]),
    Rgb([220, 38, 38]),
    Rgb([22, 163, 74]),
    Rgb([217, 119, 6]),
    Rgb([124, 58, 237]),
    Rgb([8, 145, 178]),
];

#[derive(Debug, Deserialize)]
struct ChartArgs {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    values: Vec<f64>,
}

/// Render a bar chart of `values` as PNG bytes.
///
/// Bars are scaled to the largest value, drawn left to right in palette
/// order over light grid lines at quarter heights.
pub fn render_bar_chart(labels: &[String], values: &[f64]) -> ToolResult<Vec<u8>> {
    validate(labels, values)?;

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let plot_left = MARGIN;
    let plot_right = WIDTH - MARGIN;
    let plot_top = MARGIN;
    let plot_bottom = HEIGHT - MARGIN;
    let plot_height = plot_bottom - plot_top;

    for quarter in 1..=4 {
        let y = plot_bottom - plot_height * quarter / 4;
        fill_rect(&mut img, plot_left, y, plot_right, y + 1, GRID);
    }

    let max = values.iter().copied().fold(0.0_f64, f64::max);
    let slot = (plot_right - plot_left) / values.len() as u32;
    let gap = (slot / 5).max(1);
    for (i, value) in values.iter().enumerate() {
        let height = if max > 0.0 {
            ((value / max) * f64::from(plot_height)).round() as u32
        } else {
            0
        };
        let x0 = plot_left + slot * i as u32 + gap;
        let x1 = (plot_left + slot * (i as u32 + 1)).saturating_sub(gap).max(x0 + 1);
        fill_rect(&mut img, x0, plot_bottom - height, x1, plot_bottom, PALETTE[i % PALETTE.len()]);
    }

    fill_rect(&mut img, plot_left, plot_top, plot_left + 2, plot_bottom + 1, AXIS);
    fill_rect(&mut img, plot_left, plot_bottom, plot_right, plot_bottom + 2, AXIS);

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    ensure_size(bytes.len())?;
    Ok(bytes)
}

fn validate(labels: &[String], values: &[f64]) -> ToolResult<()> {
    if values.is_empty() {
        return Err(ToolError::InvalidArguments("values must not be empty".to_string()));
    }
    if labels.len() != values.len() {
        return Err(ToolError::InvalidArguments(format!(
            "labels and values must have the same length ({} labels, {} values)",
            labels.len(),
            values.len()
        )));
    }
    if values.len() > MAX_BARS {
        return Err(ToolError::InvalidArguments(format!(
            "at most {MAX_BARS} bars are supported, got {}",
            values.len()
        )));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(ToolError::InvalidArguments(format!(
            "values must be finite and non-negative, got {bad}"
        )));
    }
    Ok(())
}

/// Fill `[x0, x1) x [y0, y1)`, clipped to the image.
fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    for y in y0..y1.min(img.height()) {
        for x in x0..x1.min(img.width()) {
            img.put_pixel(x, y, color);
        }
    }
}

/// `generate_chart_image`.
#[derive(Debug, Default)]
pub struct ChartImageTool;

impl ChartImageTool {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: Value, state: &InvocationState) -> ToolResult<String> {
        let args: ChartArgs = parse_args(args)?;
        let bytes = render_bar_chart(&args.labels, &args.values)?;
        let file_name = sanitize_file_name(&args.file_name, "png", "chart");

        let series = args
            .labels
            .iter()
            .zip(&args.values)
            .map(|(label, value)| format!("{label}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        let description = match args.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => format!("Bar chart \"{title}\" ({series})"),
            None => format!("Bar chart ({series})"),
        };

        state.store(GeneratedFile::new(bytes, &file_name, "image/png", &description));
        Ok(format!(
            "Created {file_name}: {description}. It will be attached to the reply."
        ))
    }
}

#[async_trait]
impl Tool for ChartImageTool {
    fn name(&self) -> &str {
        crate::names::GENERATE_CHART_IMAGE
    }

    fn description(&self) -> &str {
        "Render a bar chart as a PNG image from labels and non-negative values. The image carries no text, so mention the labels in your reply. The file is attached to the reply."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string", "description": "File name, e.g. revenue.png"},
                "title": {"type": "string"},
                "labels": {"type": "array", "items": {"type": "string"}},
                "values": {"type": "array", "items": {"type": "number"}}
            },
            "required": ["file_name", "labels", "values"]
        })
    }

    async fn invoke(&self, args: Value, state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args, state))
    }
}
