//! Paginated document emitter. Writes literal values only; layout is a
//! simple top-down flow over A4 pages with repeated table headers.

use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, ObjectId, Stream, StringFormat,
};

use super::{
    document::{Block, Cell, ReportDocument, Table},
    ReportError,
};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 40.0;
const FOOTER_SPACE: f32 = 24.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CELL_PADDING: f32 = 3.0;
const KEY_WIDTH: f32 = 150.0;

const TITLE_COLOR: u32 = 0x0C4A6E;
const SECTION_COLOR: u32 = 0x1E40AF;
const HEADER_FILL: u32 = 0x059669;
const STRIPE_FILL: u32 = 0xDBEAFE;
const BORDER_COLOR: u32 = 0x9CA3AF;
const TEXT_COLOR: u32 = 0x111827;
const MUTED_COLOR: u32 = 0x6B7280;

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
}

fn rgb(color: u32) -> Vec<Object> {
    [16, 8, 0]
        .iter()
        .map(|shift| (((color >> shift) & 0xFF) as f32 / 255.0).into())
        .collect()
}

/// WinAnsi bytes for the built-in Type1 fonts. Characters outside the
/// code page print as `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{2014}' => 0x97,
            '\u{2013}' => 0x96,
            '\u{2022}' => 0x95,
            '\u{2026}' => 0x85,
            '\u{20AC}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\t' => b' ',
            ch if (ch as u32) < 0x20 => b' ',
            ch if (ch as u32) <= 0xFF => ch as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5
}

/// Greedy word wrap by estimated glyph width. Words longer than a line are
/// split.
fn wrap(text: &str, width: f32, size: f32) -> Vec<String> {
    let max_chars = ((width / (size * 0.5)).floor() as usize).max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

struct PageWriter {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn is_fresh(&self) -> bool {
        self.ops.is_empty()
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn break_page(&mut self) {
        if !self.is_fresh() {
            self.new_page();
        }
    }

    /// Starts a new page when `height` does not fit above the footer.
    fn reserve(&mut self, height: f32) -> bool {
        if self.y - height < MARGIN + FOOTER_SPACE && !self.is_fresh() {
            self.new_page();
            return true;
        }
        false
    }

    fn text(&mut self, x: f32, y: f32, font: Font, size: f32, color: u32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("rg", rgb(color)));
        self.ops.push(Operation::new(
            "Tf",
            vec![font.resource().into(), size.into()],
        ));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_text(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: u32) {
        self.ops.push(Operation::new("rg", rgb(color)));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), y.into(), width.into(), height.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(Operation::new("RG", rgb(BORDER_COLOR)));
        self.ops.push(Operation::new("w", vec![0.5_f32.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), y.into(), width.into(), height.into()],
        ));
        self.ops.push(Operation::new("S", vec![]));
    }

    /// Wrapped text flowing down from the cursor.
    fn paragraph(&mut self, text: &str, font: Font, size: f32, color: u32) {
        let leading = size * 1.3;
        for line in wrap(text, CONTENT_WIDTH, size) {
            self.reserve(leading);
            self.y -= leading;
            self.text(MARGIN, self.y, font, size, color, &line);
        }
    }

    fn key_values(&mut self, pairs: &[(String, String)]) {
        let size = 9.0;
        let leading = size * 1.3;
        for (key, value) in pairs {
            let lines = wrap(value, CONTENT_WIDTH - KEY_WIDTH, size);
            self.reserve(leading * lines.len() as f32);
            let top = self.y;
            self.text(MARGIN, top - leading, Font::Bold, size, TEXT_COLOR, key);
            for (idx, line) in lines.iter().enumerate() {
                let y = top - leading * (idx as f32 + 1.0);
                self.text(MARGIN + KEY_WIDTH, y, Font::Regular, size, TEXT_COLOR, line);
            }
            self.y = top - leading * lines.len() as f32;
        }
    }

    fn table(&mut self, table: &Table) {
        let total: f64 = table.widths.iter().sum();
        let widths: Vec<f32> = table
            .widths
            .iter()
            .map(|width| {
                if total > 0.0 {
                    (*width / total) as f32 * CONTENT_WIDTH
                } else {
                    CONTENT_WIDTH / table.widths.len().max(1) as f32
                }
            })
            .collect();
        let size = 7.5;

        let header: Vec<Cell> = table.headers.iter().map(|h| Cell::text(h.clone())).collect();
        self.reserve(row_height(&header, &widths, size) * 2.0);
        self.table_row(&header, &widths, size, Some(HEADER_FILL), Font::Bold, 0xFFFFFF);

        for (idx, row) in table.rows.iter().enumerate() {
            let height = row_height(row, &widths, size);
            if self.reserve(height) {
                self.table_row(&header, &widths, size, Some(HEADER_FILL), Font::Bold, 0xFFFFFF);
            }
            let stripe = (idx % 2 == 1).then_some(STRIPE_FILL);
            self.table_row(row, &widths, size, stripe, Font::Regular, TEXT_COLOR);
        }
        self.y -= 8.0;
    }

    fn table_row(
        &mut self,
        cells: &[Cell],
        widths: &[f32],
        size: f32,
        fill: Option<u32>,
        font: Font,
        color: u32,
    ) {
        let leading = size * 1.25;
        let height = row_height(cells, widths, size);
        let bottom = self.y - height;
        let mut x = MARGIN;
        for (idx, width) in widths.iter().enumerate() {
            let cell = cells.get(idx);
            if let Some(fill) = cell.and_then(|c| c.fill).or(fill) {
                self.fill_rect(x, bottom, *width, height, fill);
            }
            self.stroke_rect(x, bottom, *width, height);
            if let Some(cell) = cell {
                let font = if cell.bold { Font::Bold } else { font };
                let lines = wrap(&cell.display(), width - 2.0 * CELL_PADDING, size);
                for (line_idx, line) in lines.iter().enumerate() {
                    let y = self.y - CELL_PADDING - leading * (line_idx as f32 + 1.0) + 2.0;
                    self.text(x + CELL_PADDING, y, font, size, color, line);
                }
            }
            x += width;
        }
        self.y = bottom;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(std::mem::take(&mut self.ops));
        }
        self.pages
    }
}

fn row_height(cells: &[Cell], widths: &[f32], size: f32) -> f32 {
    let lines = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| wrap(&cell.display(), width - 2.0 * CELL_PADDING, size).len())
        .max()
        .unwrap_or(1);
    lines as f32 * size * 1.25 + 2.0 * CELL_PADDING
}

/// Renders the report to PDF bytes. Output depends only on the report,
/// including its generation timestamp.
pub fn render(report: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let mut writer = PageWriter::new();
    for (idx, sheet) in report.sheets.iter().enumerate() {
        if idx > 0 {
            writer.break_page();
        }
        for block in &sheet.blocks {
            match block {
                Block::Title(text) => {
                    writer.paragraph(text, Font::Bold, 16.0, TITLE_COLOR);
                    writer.y -= 6.0;
                }
                Block::Heading(text) => {
                    writer.reserve(40.0);
                    writer.y -= 8.0;
                    writer.paragraph(text, Font::Bold, 12.0, SECTION_COLOR);
                    writer.y -= 4.0;
                }
                Block::Subheading(text) => {
                    writer.y -= 4.0;
                    writer.paragraph(text, Font::Bold, 10.0, SECTION_COLOR);
                    writer.y -= 2.0;
                }
                Block::Paragraph(text) => {
                    writer.paragraph(text, Font::Regular, 9.0, TEXT_COLOR);
                    writer.y -= 4.0;
                }
                Block::KeyValues(pairs) => {
                    writer.key_values(pairs);
                    writer.y -= 6.0;
                }
                Block::Table(table) => writer.table(table),
                Block::PageBreak => writer.break_page(),
                Block::Spacer => writer.y -= 10.0,
            }
        }
    }

    let pages = writer.finish();
    let footer = report.footer();
    let page_count = pages.len();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let font_bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_regular,
            "F2" => font_bold,
        },
    });

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(page_count);
    for (idx, mut ops) in pages.into_iter().enumerate() {
        let mut footer_ops = PageWriter::new();
        footer_ops.text(MARGIN, MARGIN - 10.0, Font::Regular, 7.0, MUTED_COLOR, &footer);
        let page_label = format!("Page {} of {}", idx + 1, page_count);
        footer_ops.text(
            PAGE_WIDTH - MARGIN - text_width(&page_label, 7.0),
            MARGIN - 10.0,
            Font::Regular,
            7.0,
            MUTED_COLOR,
            &page_label,
        );
        ops.append(&mut footer_ops.ops);

        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<Object>>(),
        "Count" => page_ids.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0_i64.into(), 0_i64.into(), (PAGE_WIDTH as i64).into(), (PAGE_HEIGHT as i64).into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| ReportError::Encoding(err.to_string()))?;
    Ok(bytes)
}
