use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use crate::analysis::classify;
use crate::backends::InstructionDecoder;
use crate::db::snapshot::{
    ByteChunk, CommentEntry, Item, ItemData, NameEntry, Snapshot, SwitchEntry, Xref, XrefKind,
};
use crate::db::{AnalysisDb, DbError, DbResult};
use crate::model::{Address, Flags, Function, Instruction, ListingLine, OperandRepr, Segment};

/// Mnemonics the in-memory database treats as alignment filler.
pub const PADDING_MNEMONICS: &[&str] = &["nop", "int3"];

/// Longest byte window handed to a raw-byte decoder.
const DECODE_WINDOW: u64 = 16;

/// In-memory analysis database.
///
/// Backs tests and the CLI. State is plain ordered maps; every mutation is
/// applied immediately. Decoding consults the pre-decoded instruction table
/// first and falls back to the configured [`InstructionDecoder`] over the raw
/// image bytes.
#[derive(Debug, Clone)]
pub struct MemoryDb {
    arch: Option<String>,
    auto_analysis_complete: bool,
    analysis_cancelled: bool,
    segments: Vec<Segment>,
    chunks: BTreeMap<Address, Vec<u8>>,
    instructions: BTreeMap<Address, Instruction>,
    items: BTreeMap<Address, Item>,
    functions: BTreeMap<Address, Function>,
    xrefs: BTreeSet<Xref>,
    comments: BTreeMap<Address, String>,
    names: BTreeMap<Address, String>,
    switch_tables: BTreeMap<Address, Address>,
    decoder: Option<Arc<dyn InstructionDecoder>>,
}

#[cfg(feature = "capstone-decoder")]
fn decoder_for_arch(arch: &str) -> Option<Arc<dyn InstructionDecoder>> {
    let mode = crate::backends::DecoderMode::from_hint(arch)?;
    Some(Arc::new(crate::backends::CapstoneDecoder::new(mode)))
}

#[cfg(not(feature = "capstone-decoder"))]
fn decoder_for_arch(arch: &str) -> Option<Arc<dyn InstructionDecoder>> {
    tracing::debug!("no raw-byte decoder built in for arch '{arch}'");
    None
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            arch: None,
            auto_analysis_complete: true,
            analysis_cancelled: false,
            segments: Vec::new(),
            chunks: BTreeMap::new(),
            instructions: BTreeMap::new(),
            items: BTreeMap::new(),
            functions: BTreeMap::new(),
            xrefs: BTreeSet::new(),
            comments: BTreeMap::new(),
            names: BTreeMap::new(),
            switch_tables: BTreeMap::new(),
            decoder: None,
        }
    }

    /// Build a database from a snapshot.
    ///
    /// When the `capstone-decoder` feature is enabled and the snapshot names a
    /// known architecture, raw bytes without a pre-decoded instruction are
    /// decoded with capstone.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut db = Self::new();
        db.auto_analysis_complete = snapshot.auto_analysis_complete;
        for segment in snapshot.segments {
            db.add_segment(segment);
        }
        for chunk in snapshot.chunks {
            db.load_bytes(chunk.start, &chunk.bytes);
        }
        for insn in snapshot.instructions {
            db.add_instruction(insn);
        }
        for item in snapshot.items {
            db.add_item(item);
        }
        for func in snapshot.functions {
            db.add_function(func);
        }
        for xref in snapshot.xrefs {
            db.add_xref(xref);
        }
        for entry in snapshot.comments {
            db.set_comment(entry.address, entry.text);
        }
        for entry in snapshot.names {
            db.set_name(entry.address, entry.name);
        }
        for entry in snapshot.switch_tables {
            db.add_switch_table(entry.table, entry.parent);
        }

        if let Some(decoder) = snapshot.arch.as_deref().and_then(decoder_for_arch) {
            db.set_decoder(decoder);
        }
        db.arch = snapshot.arch;
        db
    }

    /// Capture the current state as a snapshot.
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            arch: self.arch.clone(),
            auto_analysis_complete: self.auto_analysis_complete,
            segments: self.segments.clone(),
            chunks: self
                .chunks
                .iter()
                .map(|(start, bytes)| ByteChunk { start: *start, bytes: bytes.clone() })
                .collect(),
            instructions: self.instructions.values().cloned().collect(),
            items: self.items.values().cloned().collect(),
            functions: self.functions.values().copied().collect(),
            xrefs: self.xrefs.iter().copied().collect(),
            comments: self
                .comments
                .iter()
                .map(|(address, text)| CommentEntry { address: *address, text: text.clone() })
                .collect(),
            names: self
                .names
                .iter()
                .map(|(address, name)| NameEntry { address: *address, name: name.clone() })
                .collect(),
            switch_tables: self
                .switch_tables
                .iter()
                .map(|(table, parent)| SwitchEntry { table: *table, parent: *parent })
                .collect(),
        }
    }

    // Builders.

    pub fn add_segment(&mut self, segment: Segment) -> &mut Self {
        self.segments.push(segment);
        self.segments.sort_by_key(|s| s.start);
        self
    }

    pub fn load_bytes(&mut self, start: impl Into<Address>, bytes: &[u8]) -> &mut Self {
        self.chunks.insert(start.into(), bytes.to_vec());
        self
    }

    /// Register what the decoder reports at an address, without defining an item.
    pub fn add_instruction(&mut self, insn: Instruction) -> &mut Self {
        self.instructions.insert(insn.address, insn);
        self
    }

    /// Register an instruction and define it as a code item.
    pub fn add_code(&mut self, insn: Instruction) -> &mut Self {
        let item = Item::code(insn.address, insn.len);
        self.add_instruction(insn);
        self.add_item(item)
    }

    pub fn add_item(&mut self, item: Item) -> &mut Self {
        self.items.insert(item.address, item);
        self
    }

    pub fn add_function(&mut self, func: Function) -> &mut Self {
        self.functions.insert(func.start, func);
        self
    }

    pub fn add_xref(&mut self, xref: Xref) -> &mut Self {
        self.xrefs.insert(xref);
        self
    }

    pub fn set_comment(&mut self, ea: impl Into<Address>, text: impl Into<String>) -> &mut Self {
        self.comments.insert(ea.into(), text.into());
        self
    }

    pub fn set_name(&mut self, ea: impl Into<Address>, name: impl Into<String>) -> &mut Self {
        self.names.insert(ea.into(), name.into());
        self
    }

    pub fn add_switch_table(
        &mut self,
        table: impl Into<Address>,
        parent: impl Into<Address>,
    ) -> &mut Self {
        self.switch_tables.insert(table.into(), parent.into());
        self
    }

    pub fn set_decoder(&mut self, decoder: Arc<dyn InstructionDecoder>) -> &mut Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn set_auto_analysis_complete(&mut self, complete: bool) -> &mut Self {
        self.auto_analysis_complete = complete;
        self
    }

    // Inspection.

    /// Item whose head is exactly `ea`.
    pub fn item_at(&self, ea: impl Into<Address>) -> Option<&Item> {
        self.items.get(&ea.into())
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn functions(&self) -> Vec<Function> {
        self.functions.values().copied().collect()
    }

    pub fn has_data_ref(&self, from: impl Into<Address>, to: impl Into<Address>) -> bool {
        self.xrefs.contains(&Xref::data(from, to))
    }

    pub fn name_at(&self, ea: impl Into<Address>) -> Option<&str> {
        self.names.get(&ea.into()).map(String::as_str)
    }

    pub fn operand_repr(&self, ea: impl Into<Address>, n: usize) -> OperandRepr {
        self.item_at(ea).and_then(|item| item.operands.get(n).copied()).unwrap_or_default()
    }

    pub fn analysis_cancelled(&self) -> bool {
        self.analysis_cancelled
    }

    // Internals.

    fn item_covering(&self, ea: Address) -> Option<&Item> {
        self.items.range(..=ea).next_back().map(|(_, item)| item).filter(|item| item.contains(ea))
    }

    fn first_overlap(&self, ea: Address, size: u64) -> Option<&Item> {
        let end = ea.offset(size);
        self.items.range(..end).next_back().map(|(_, item)| item).filter(|item| item.end() > ea)
    }

    fn bytes_at(&self, ea: Address, len: u64) -> Option<&[u8]> {
        let (start, bytes) = self.chunks.range(..=ea).next_back()?;
        let offset = usize::try_from(ea - *start).ok()?;
        if offset >= bytes.len() {
            return None;
        }
        let end = offset.saturating_add(len as usize).min(bytes.len());
        Some(&bytes[offset..end])
    }

    fn segment_end(&self, ea: Address) -> Option<Address> {
        self.segments.iter().find(|s| s.contains(ea)).map(|s| s.end)
    }
}

impl AnalysisDb for MemoryDb {
    fn flags(&self, ea: Address) -> Flags {
        let mut flags = Flags::empty();
        match self.item_covering(ea) {
            Some(item) if item.address != ea => flags |= Flags::TAIL,
            Some(item) => {
                flags |= match item.data {
                    ItemData::Code => Flags::CODE,
                    ItemData::Data { .. } => Flags::DATA,
                    ItemData::Align { .. } => Flags::DATA | Flags::ALIGN,
                };
                if item.struct_member {
                    flags |= Flags::STRUCT;
                }
                if item.strlit {
                    flags |= Flags::STRLIT;
                }
                if item.operands[0] == OperandRepr::Offset {
                    flags |= Flags::OFF0;
                }
                if item.operands[1] == OperandRepr::Offset {
                    flags |= Flags::OFF1;
                }
            }
            None => flags |= Flags::UNKNOWN,
        }
        if self.xrefs.iter().any(|x| x.to == ea) {
            flags |= Flags::XREF;
        }
        if self.comments.contains_key(&ea) {
            flags |= Flags::COMMENT;
        }
        if self.functions.contains_key(&ea) {
            flags |= Flags::FUNC;
        }
        flags
    }

    fn alignment(&self, ea: Address) -> Option<u64> {
        match self.items.get(&ea)?.data {
            ItemData::Align { alignment } => Some(alignment),
            _ => None,
        }
    }

    fn comment(&self, ea: Address) -> Option<String> {
        self.comments.get(&ea).cloned()
    }

    fn read_u32(&self, ea: Address) -> Option<u32> {
        let bytes = self.bytes_at(ea, 4)?;
        let word: [u8; 4] = bytes.try_into().ok()?;
        Some(u32::from_le_bytes(word))
    }

    fn item_size(&self, ea: Address) -> u64 {
        self.items.get(&ea).map(|item| item.size).unwrap_or(1)
    }

    fn element_size(&self, ea: Address) -> u64 {
        match self.items.get(&ea) {
            Some(Item { data: ItemData::Data { element_size }, .. }) => (*element_size).max(1),
            Some(item) => item.size,
            None => 1,
        }
    }

    fn next_head(&self, ea: Address) -> Address {
        match self.item_covering(ea) {
            Some(item) => item.end(),
            None => ea.offset(1),
        }
    }

    fn prev_head(&self, ea: Address) -> Option<Address> {
        let prev = Address(ea.value().checked_sub(1)?);
        Some(self.item_covering(prev).map(|item| item.address).unwrap_or(prev))
    }

    fn decode(&self, ea: Address) -> Option<Instruction> {
        // A zero-length instruction would stall every forward walk.
        if let Some(insn) = self.instructions.get(&ea) {
            return (insn.len > 0).then(|| insn.clone());
        }
        let decoder = self.decoder.as_ref()?;
        let bytes = self.bytes_at(ea, DECODE_WINDOW)?;
        decoder.decode(ea, bytes).filter(|insn| insn.len > 0)
    }

    fn is_padding_insn(&self, ea: Address) -> bool {
        self.decode(ea).is_some_and(|insn| PADDING_MNEMONICS.contains(&insn.mnemonic.as_str()))
    }

    fn function_at(&self, ea: Address) -> Option<Function> {
        self.functions.range(..=ea).next_back().map(|(_, f)| *f).filter(|f| f.contains(ea))
    }

    fn next_function(&self, ea: Address) -> Option<Function> {
        self.functions.range((Bound::Excluded(ea), Bound::Unbounded)).next().map(|(_, f)| *f)
    }

    fn create_function(&mut self, ea: Address) -> DbResult<()> {
        if let Some(existing) = self.function_at(ea) {
            return Err(DbError::Rejected {
                op: "create_function",
                address: ea,
                reason: format!("already inside the function at {}", existing.start),
            });
        }
        let limit = self.segment_end(ea).unwrap_or(Address(u64::MAX));

        // Linear flow walk: stop after a return/jump, or before padding,
        // another function, data, or an undecodable location.
        let mut cursor = ea;
        while cursor < limit {
            if cursor != ea && (self.function_at(cursor).is_some() || self.is_padding_insn(cursor))
            {
                break;
            }
            let Some(insn) = self.decode(cursor) else { break };
            if insn.next() <= cursor {
                break;
            }
            match self.item_covering(cursor) {
                Some(item) if item.address == cursor && item.data == ItemData::Code => {}
                Some(_) => break,
                None => {
                    if self.first_overlap(cursor, insn.len).is_some() {
                        break;
                    }
                    self.items.insert(cursor, Item::code(cursor, insn.len));
                }
            }
            cursor = insn.next();
            if classify::is_return(&insn) || classify::is_unconditional_jump(&insn) {
                break;
            }
        }

        if cursor == ea {
            return Err(DbError::Undecodable(ea));
        }
        self.functions.insert(ea, Function::new(ea, cursor));
        Ok(())
    }

    fn delete_function(&mut self, start: Address) -> DbResult<()> {
        self.functions
            .remove(&start)
            .map(|_| ())
            .ok_or(DbError::NotFound { what: "function", address: start })
    }

    fn set_function_end(&mut self, start: Address, end: Address) -> DbResult<()> {
        if !self.functions.contains_key(&start) {
            return Err(DbError::NotFound { what: "function", address: start });
        }
        if end <= start {
            return Err(DbError::Rejected {
                op: "set_function_end",
                address: start,
                reason: format!("end {end} is not after the start"),
            });
        }
        if let Some((other, _)) =
            self.functions.range((Bound::Excluded(start), Bound::Excluded(end))).next()
        {
            return Err(DbError::Conflict {
                op: "set_function_end",
                address: start,
                existing: *other,
            });
        }
        if let Some(func) = self.functions.get_mut(&start) {
            func.end = end;
        }
        Ok(())
    }

    fn data_refs_to(&self, ea: Address) -> Vec<Address> {
        self.xrefs
            .iter()
            .filter(|x| x.to == ea && x.kind == XrefKind::Data)
            .map(|x| x.from)
            .collect()
    }

    fn delete_data_ref(&mut self, from: Address, to: Address) -> DbResult<()> {
        if self.xrefs.remove(&Xref::data(from, to)) {
            Ok(())
        } else {
            Err(DbError::NotFound { what: "data reference", address: from })
        }
    }

    fn switch_parent(&self, ea: Address) -> Option<Address> {
        self.switch_tables.get(&ea).copied()
    }

    fn create_instruction(&mut self, ea: Address) -> DbResult<()> {
        if matches!(self.items.get(&ea), Some(item) if item.data == ItemData::Code) {
            return Ok(());
        }
        let insn = self.decode(ea).ok_or(DbError::Undecodable(ea))?;
        if let Some(existing) = self.first_overlap(ea, insn.len) {
            return Err(DbError::Conflict {
                op: "create_instruction",
                address: ea,
                existing: existing.address,
            });
        }
        self.items.insert(ea, Item::code(ea, insn.len));
        Ok(())
    }

    fn create_scalar(&mut self, ea: Address, width: u64) -> DbResult<()> {
        if self.bytes_at(ea, width).map(<[u8]>::len) != Some(width as usize) {
            return Err(DbError::Rejected {
                op: "create_scalar",
                address: ea,
                reason: format!("{width} bytes are not loaded"),
            });
        }
        if let Some(existing) = self.first_overlap(ea, width) {
            return Err(DbError::Conflict {
                op: "create_scalar",
                address: ea,
                existing: existing.address,
            });
        }
        self.items.insert(ea, Item::data(ea, width, width));
        Ok(())
    }

    fn create_alignment(&mut self, ea: Address, size: u64, alignment: u64) -> DbResult<()> {
        if let Some(start) = self.functions.range(ea..ea.offset(size)).next().map(|(s, _)| *s) {
            return Err(DbError::Rejected {
                op: "create_alignment",
                address: ea,
                reason: format!("function at {start} starts inside the range"),
            });
        }
        if let Some(existing) = self.first_overlap(ea, size) {
            return Err(DbError::Conflict {
                op: "create_alignment",
                address: ea,
                existing: existing.address,
            });
        }
        self.items.insert(ea, Item::align(ea, size, alignment));
        Ok(())
    }

    fn delete_items(&mut self, ea: Address, size: u64) -> DbResult<()> {
        let end = ea.offset(size);
        let doomed: Vec<Address> = self
            .items
            .range(..end)
            .filter(|(_, item)| item.end() > ea)
            .map(|(start, _)| *start)
            .collect();
        for start in doomed {
            self.items.remove(&start);
        }
        Ok(())
    }

    fn set_operand_repr(&mut self, ea: Address, n: usize, repr: OperandRepr) -> DbResult<()> {
        let item =
            self.items.get_mut(&ea).ok_or(DbError::NotFound { what: "item", address: ea })?;
        let slot = item.operands.get_mut(n).ok_or_else(|| DbError::Rejected {
            op: "set_operand_repr",
            address: ea,
            reason: format!("operand {n} is not tracked"),
        })?;
        *slot = repr;
        Ok(())
    }

    fn segments(&self) -> Vec<Segment> {
        self.segments.clone()
    }

    fn delete_name(&mut self, ea: Address) -> DbResult<()> {
        self.names.remove(&ea).map(|_| ()).ok_or(DbError::NotFound { what: "name", address: ea })
    }

    fn render_lines(&self, start: Address, end: Address) -> Vec<ListingLine> {
        let mut lines = Vec::new();
        let mut ea = start;
        while ea < end {
            if self.functions.contains_key(&ea) {
                let banner =
                    "; =============== S U B R O U T I N E =======================================";
                lines.push(ListingLine { address: ea, text: String::new(), primary: false });
                lines.push(ListingLine { address: ea, text: banner.to_string(), primary: false });
                if let Some(name) = self.names.get(&ea) {
                    lines.push(ListingLine {
                        address: ea,
                        text: format!("{:08X} {name} proc near", ea.value()),
                        primary: false,
                    });
                }
            }

            let body = match self.items.get(&ea).map(|item| item.data) {
                Some(ItemData::Code) => match self.decode(ea) {
                    Some(insn) if insn.text.is_empty() => insn.mnemonic,
                    Some(insn) => format!("{:<7} {}", insn.mnemonic, insn.text),
                    None => "db ?".to_string(),
                },
                Some(ItemData::Data { element_size: 4 }) => match self.read_u32(ea) {
                    Some(value) => format!("dd {value:X}h"),
                    None => "dd ?".to_string(),
                },
                Some(ItemData::Data { .. }) => "db ?".to_string(),
                Some(ItemData::Align { alignment }) => format!("align {alignment}"),
                None => match self.bytes_at(ea, 1) {
                    Some([byte]) => format!("db {byte:02X}h"),
                    _ => "db ?".to_string(),
                },
            };
            let text = match self.comments.get(&ea) {
                Some(comment) => format!("{:08X}    {body:<32} ; {comment}", ea.value()),
                None => format!("{:08X}    {body}", ea.value()),
            };
            lines.push(ListingLine { address: ea, text, primary: true });
            ea = self.next_head(ea);
        }
        lines
    }

    fn auto_analysis_idle(&self) -> bool {
        self.auto_analysis_complete
    }

    fn cancel_pending_analysis(&mut self) {
        self.analysis_cancelled = true;
        self.auto_analysis_complete = true;
    }
}
