//! ESC/POS receipt layout on a fixed-width character grid

use super::model::DocumentModel;

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;

/// Reset printer state
const INIT: [u8; 2] = [ESC, b'@'];
const BOLD_ON: [u8; 3] = [ESC, b'E', 1];
const BOLD_OFF: [u8; 3] = [ESC, b'E', 0];
/// Partial cut
const CUT: [u8; 3] = [GS, b'V', 1];

/// Printed under the total once nothing is owed
pub const FULLY_PAID_MARKER: &str = "*** LUNAS ***";

/// Label of the outstanding-balance line
pub const REMAINDER_LABEL: &str = "SISA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermalLayout {
    /// Characters per line
    pub width: usize,
    /// Blank lines between the footer and the cutter
    pub cut_feed_lines: usize,
}

impl Default for ThermalLayout {
    fn default() -> Self {
        Self {
            width: 38,
            cut_feed_lines: 6,
        }
    }
}

/// Lay out a receipt as an ESC/POS byte stream
pub fn render_receipt(model: &DocumentModel, layout: &ThermalLayout) -> Vec<u8> {
    let mut out = Receipt::new(layout.width);
    out.raw(&INIT);

    out.raw(&BOLD_ON);
    out.centered(&model.store.name);
    out.raw(&BOLD_OFF);
    if let Some(address) = &model.store.address {
        out.centered(address);
    }
    if let Some(phone) = &model.store.phone {
        out.centered(phone);
    }
    out.rule('=');

    out.centered(&model.title);
    if let Some(number) = &model.invoice_number {
        out.columns("No", number);
    }
    out.columns("Tanggal", &model.date);
    if let Some(sales) = &model.sales_name {
        out.columns("Sales", sales);
    }
    if let Some(name) = model.customer.as_ref().and_then(|c| c.name.as_deref()) {
        out.columns("Pelanggan", name);
    }
    out.rule('-');

    for item in &model.items {
        let name = if item.quantity > 1 {
            format!("{} x {}", item.quantity, item.name)
        } else {
            item.name.clone()
        };
        out.wrapped(&name);
        out.columns(&item.descriptor, &item.price);
        if let Some(description) = &item.description {
            out.wrapped(description);
        }
    }
    out.rule('-');

    out.raw(&BOLD_ON);
    out.columns("TOTAL", &model.total);
    out.raw(&BOLD_OFF);

    let payment = &model.payment;
    if let Some(channel) = &payment.channel {
        out.columns("Bayar", channel);
    }
    if let Some(deposit) = &payment.deposit {
        out.columns("DP", deposit);
    }
    if let Some(remainder) = &payment.remainder {
        out.columns(REMAINDER_LABEL, remainder);
    }
    if payment.fully_paid {
        out.blank();
        out.centered(FULLY_PAID_MARKER);
    }

    if let Some(notes) = &model.notes {
        out.rule('-');
        out.line("Catatan:");
        out.wrapped(notes);
    }

    out.rule('=');
    out.centered(&model.store.footer);

    for _ in 0..layout.cut_feed_lines {
        out.blank();
    }
    out.raw(&CUT);

    out.into_bytes()
}

struct Receipt {
    bytes: Vec<u8>,
    width: usize,
}

impl Receipt {
    fn new(width: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(1024),
            width,
        }
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn blank(&mut self) {
        self.bytes.push(b'\n');
    }

    /// One line, truncated to the grid
    fn line(&mut self, text: &str) {
        let text: String = sanitize(text).chars().take(self.width).collect();
        self.bytes.extend_from_slice(text.trim_end().as_bytes());
        self.bytes.push(b'\n');
    }

    fn wrapped(&mut self, text: &str) {
        for line in wrap(&sanitize(text), self.width) {
            self.line(&line);
        }
    }

    fn centered(&mut self, text: &str) {
        for line in wrap(&sanitize(text), self.width) {
            let pad = (self.width - line.len()) / 2;
            self.line(&format!("{}{}", " ".repeat(pad), line));
        }
    }

    /// `left` flush left, `right` flush right; `left` is cut to make room
    fn columns(&mut self, left: &str, right: &str) {
        let right: String = sanitize(right).chars().take(self.width).collect();
        if right.len() + 1 >= self.width {
            self.line(&right);
            return;
        }

        let room = self.width - right.len() - 1;
        let left: String = sanitize(left).chars().take(room).collect();
        let gap = self.width - left.len() - right.len();
        self.line(&format!("{}{}{}", left, " ".repeat(gap), right));
    }

    fn rule(&mut self, ch: char) {
        self.line(&ch.to_string().repeat(self.width));
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Printable ASCII only; anything else becomes '?'
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap; words longer than a line are split
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let (head, tail) = word.split_at(width);
            lines.push(head.to_string());
            word = tail;
        }
        if word.is_empty() {
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
