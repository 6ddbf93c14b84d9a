use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};
use image::GenericImageView;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use crate::config::{LetterTemplate, OutputFormat};
use crate::error::RenderError;
use crate::parser::{LetterRecord, ParsedRecord};
use crate::render::{artifact_path, write_artifact, DocumentArtifact, DocumentRenderer, TemplateAssets};

// A4 in points
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const TITLE_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 11.0;
const SMALL_SIZE: f32 = 9.0;
const LEADING: f32 = 15.0;
const DYNAMIC_INDENT: f32 = 24.0;

const LOGO_BOX: (f32, f32) = (150.0, 60.0);
const FOOTER_BOX: (f32, f32) = (CONTENT_WIDTH, 70.0);
const FOOTER_GAP: f32 = 8.0;
const MIN_FOOTER_HEIGHT: f32 = 12.0;
// Below the baseline
const DESCENT: f32 = 4.0;

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Renders a one-page credit-note letter to PDF: header with optional logos,
/// static boilerplate, the interpolated data section and an optional footer
/// image.
pub struct LetterRenderer {
    template: LetterTemplate,
    date: Option<NaiveDate>,
}

impl LetterRenderer {
    pub fn new(template: LetterTemplate) -> Self {
        Self {
            template,
            date: None,
        }
    }

    /// Pins the date printed on the letter instead of using today's.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

impl DocumentRenderer for LetterRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Letter
    }

    fn render(
        &self,
        record: &ParsedRecord,
        assets: Option<&TemplateAssets>,
        source: &Path,
    ) -> Result<DocumentArtifact, RenderError> {
        let _span = tracing::info_span!("render.letter").entered();

        let ParsedRecord::Letter(fields) = record else {
            return Err(RenderError::RecordMismatch { expected: "letter" });
        };

        let path = artifact_path(source, OutputFormat::Letter)?;
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        let images = LetterImages::load(assets);

        let bytes = build_letter_pdf(&self.template, fields, date, &images)?;
        write_artifact(&path, &bytes)?;

        Ok(DocumentArtifact {
            path,
            format: OutputFormat::Letter,
        })
    }
}

/// The data-driven sentences of the letter, in print order.
pub fn dynamic_lines(record: &LetterRecord) -> Vec<String> {
    vec![
        format!("Lista de Credito {}", record.id),
        format!("Mano de obra: US$ {}", record.labor_cost),
        format!("Repuestos: US$ {}", record.parts_cost),
        format!("Total: US$ {}", record.total),
        format!(
            "Este crédito corresponde al movimiento de {}",
            record.movement_reference
        ),
        format!("Débito {} = US$ {}", record.debit_code, record.debit_amount),
    ]
}

/// `"Ciudad de Panamá, 5 de enero de 2024"`
pub fn locality_date_line(locality: &str, date: NaiveDate) -> String {
    format!(
        "{}, {} de {} de {}",
        locality,
        date.day(),
        MONTHS_ES[date.month0() as usize],
        date.year()
    )
}

/// Encodes text for the standard Type1 fonts with `WinAnsiEncoding`.
/// Latin-1 maps one to one; a few typographic marks live in 0x80..0x9F;
/// anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

struct LetterImage {
    width: u32,
    height: u32,
    stream: Stream,
    smask: Option<Stream>,
}

impl LetterImage {
    /// Scales the image to fit inside `(max_w, max_h)` keeping its ratio.
    fn fit(&self, (max_w, max_h): (f32, f32)) -> (f32, f32) {
        let (w, h) = (self.width as f32, self.height as f32);
        let scale = (max_w / w).min(max_h / h);
        (w * scale, h * scale)
    }
}

#[derive(Default)]
struct LetterImages {
    left: Option<LetterImage>,
    right: Option<LetterImage>,
    footer: Option<LetterImage>,
}

impl LetterImages {
    fn load(assets: Option<&TemplateAssets>) -> Self {
        let Some(assets) = assets else {
            return Self::default();
        };
        Self {
            left: load_asset("left_logo", assets.left_logo.as_deref()),
            right: load_asset("right_logo", assets.right_logo.as_deref()),
            footer: load_asset("footer", assets.footer.as_deref()),
        }
    }

    fn named(&self) -> [(&'static str, Option<&LetterImage>); 3] {
        [
            ("ImLeft", self.left.as_ref()),
            ("ImRight", self.right.as_ref()),
            ("ImFooter", self.footer.as_ref()),
        ]
    }
}

/// Loads one optional asset. Anything short of a readable, decodable image
/// leaves the slot empty.
fn load_asset(slot: &str, configured: Option<&Path>) -> Option<LetterImage> {
    let configured = configured?;
    let Some(path) = TemplateAssets::resolve(Some(configured)) else {
        tracing::debug!(slot, path = %configured.display(), "Asset not found, leaving slot blank");
        return None;
    };

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(slot, "Failed to read asset {}: {}", path.display(), e);
            return None;
        }
    };

    match image_xobject(&data) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!(slot, "Skipping asset {}: {}", path.display(), e);
            None
        }
    }
}

fn image_xobject(data: &[u8]) -> Result<LetterImage, RenderError> {
    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Pdf(format!("Failed to load image: {}", e)))?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::Pdf("Image has no pixels".to_string()));
    }

    let is_rgb_jpeg = matches!(image::guess_format(data), Ok(image::ImageFormat::Jpeg))
        && img.color() == image::ColorType::Rgb8;

    let stream = if is_rgb_jpeg {
        // JPEG data can be embedded as-is
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            data.to_vec(),
        )
    } else {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            img.to_rgb8().into_raw(),
        )
    };

    let smask = img.color().has_alpha().then(|| {
        let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p.0[3]).collect();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        )
    });

    Ok(LetterImage {
        width,
        height,
        stream,
        smask,
    })
}

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    /// Rough average glyph width of Helvetica, as a fraction of the size.
    fn average_width(self) -> f32 {
        match self {
            Font::Regular => 0.5,
            Font::Bold => 0.55,
        }
    }
}

fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().count() as f32 * size * font.average_width()
}

/// Greedy word wrap against the approximate text width.
fn wrap(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if !current.is_empty() && text_width(&candidate, font, size) > max_width {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Accumulates the page's content stream operators.
struct PageContent {
    ops: Vec<u8>,
}

impl PageContent {
    fn new() -> Self {
        Self { ops: Vec::new() }
    }

    fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        self.ops.extend_from_slice(
            format!("BT /{} {} Tf {:.2} {:.2} Td (", font.resource(), size, x, y).as_bytes(),
        );
        for byte in encode_win_ansi(text) {
            match byte {
                b'(' | b')' | b'\\' => {
                    self.ops.push(b'\\');
                    self.ops.push(byte);
                }
                0x20..=0x7e => self.ops.push(byte),
                _ => self.ops.extend_from_slice(format!("\\{:03o}", byte).as_bytes()),
            }
        }
        self.ops.extend_from_slice(b") Tj ET\n");
    }

    fn text_right(&mut self, font: Font, size: f32, right: f32, y: f32, text: &str) {
        let x = (right - text_width(text, font, size)).max(MARGIN);
        self.text(font, size, x, y, text);
    }

    /// Writes a wrapped paragraph and returns the baseline below it.
    fn paragraph(&mut self, font: Font, size: f32, x: f32, mut y: f32, text: &str) -> f32 {
        let width = PAGE_WIDTH - MARGIN - x;
        let lines = wrap(text, font, size, width);
        if lines.is_empty() {
            // Blank template lines still take up vertical space
            return y - LEADING;
        }
        for line in lines {
            self.text(font, size, x, y, &line);
            y -= LEADING;
        }
        y
    }

    fn image(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32) {
        self.ops.extend_from_slice(
            format!(
                "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /{} Do Q\n",
                width, height, x, y, name
            )
            .as_bytes(),
        );
    }

    fn into_bytes(self) -> Vec<u8> {
        self.ops
    }
}

fn compose_page(
    template: &LetterTemplate,
    record: &LetterRecord,
    date: NaiveDate,
    images: &LetterImages,
) -> PageContent {
    let mut page = PageContent::new();
    let top = PAGE_HEIGHT - MARGIN;

    // Header: left cell holds logo above the title, right cell a second logo
    let mut title_top = top;
    if let Some(logo) = &images.left {
        let (w, h) = logo.fit(LOGO_BOX);
        page.image("ImLeft", MARGIN, top - h, w, h);
        title_top = top - h - 8.0;
    }
    let title_baseline = title_top - TITLE_SIZE;
    page.text(Font::Bold, TITLE_SIZE, MARGIN, title_baseline, &template.title);

    let mut right_bottom = top;
    if let Some(logo) = &images.right {
        let (w, h) = logo.fit(LOGO_BOX);
        page.image("ImRight", PAGE_WIDTH - MARGIN - w, top - h, w, h);
        right_bottom = top - h;
    }

    let mut y = title_baseline.min(right_bottom) - 2.0 * LEADING;

    // Static boilerplate
    page.text(Font::Regular, SMALL_SIZE, MARGIN, y, &template.document_code);
    y -= LEADING;
    page.text_right(
        Font::Regular,
        BODY_SIZE,
        PAGE_WIDTH - MARGIN,
        y,
        &locality_date_line(&template.locality, date),
    );
    y -= 2.0 * LEADING;

    for line in &template.address_lines {
        y = page.paragraph(Font::Regular, BODY_SIZE, MARGIN, y, line);
    }
    y -= LEADING;
    for line in &template.reference_lines {
        y = page.paragraph(Font::Bold, BODY_SIZE, MARGIN, y, line);
    }
    y -= LEADING;
    y = page.paragraph(Font::Regular, BODY_SIZE, MARGIN, y, &template.greeting);
    y -= LEADING / 2.0;
    y = page.paragraph(Font::Regular, BODY_SIZE, MARGIN, y, &template.introduction);
    y -= LEADING;

    // Data section
    for line in dynamic_lines(record) {
        y = page.paragraph(Font::Regular, BODY_SIZE, MARGIN + DYNAMIC_INDENT, y, &line);
    }
    y -= LEADING;

    for line in &template.closing_lines {
        y = page.paragraph(Font::Regular, BODY_SIZE, MARGIN, y, line);
    }

    if let Some(footer) = &images.footer {
        // Shrink the footer into whatever is left under the last text line
        let text_bottom = y + LEADING - DESCENT;
        let available = (text_bottom - FOOTER_GAP - MARGIN).min(FOOTER_BOX.1);
        if available >= MIN_FOOTER_HEIGHT {
            let (w, h) = footer.fit((FOOTER_BOX.0, available));
            page.image("ImFooter", MARGIN + (CONTENT_WIDTH - w) / 2.0, MARGIN, w, h);
        } else {
            tracing::warn!("No room left for the footer image, leaving it out");
        }
    }

    page
}

fn build_letter_pdf(
    template: &LetterTemplate,
    record: &LetterRecord,
    date: NaiveDate,
    images: &LetterImages,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut resources = dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    };

    let mut xobjects = Dictionary::new();
    let mut has_images = false;
    for (name, image) in images.named() {
        let Some(image) = image else { continue };
        let mut stream = image.stream.clone();
        if let Some(mask) = &image.smask {
            let mask_id = doc.add_object(mask.clone());
            stream.dict.set("SMask", mask_id);
        }
        let image_id = doc.add_object(stream);
        xobjects.set(name, image_id);
        has_images = true;
    }
    if has_images {
        resources.set("XObject", xobjects);
    }
    let resources_id = doc.add_object(resources);

    let content = compose_page(template, record, date, images).into_bytes();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    Ok(buffer)
}
