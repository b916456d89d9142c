//! MDR1: the list of maps in an index file.
//!
//! Each map record points at a reverse index for that map, here called a
//! sub-section. A sub-section lists, for other MDR sections that mix records
//! from several maps, the record numbers that belong to this map. A reader
//! can then pull out one map's records without scanning whole sections.

use crate::consts::{MDR1_DEVICE_ITEM_SIZE, MDR1_ITEM_SIZE};
use crate::{ImgError, ImgErrorCode, ImgFileWriter, Result};

/// Settings shared by the MDR sections of one index file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MdrConfig {
    /// Build the compact layout read by devices instead of the PC layout.
    pub for_device: bool,
}

impl MdrConfig {
    pub fn device() -> Self {
        Self { for_device: true }
    }

    /// Byte size of one MDR1 record.
    pub fn item_size(self) -> usize {
        if self.for_device {
            MDR1_DEVICE_ITEM_SIZE
        } else {
            MDR1_ITEM_SIZE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mdr1Record {
    map_number: u32,
    index_offset: u32,
}

impl Mdr1Record {
    pub fn new(map_number: u32) -> Self {
        Self {
            map_number,
            index_offset: 0,
        }
    }

    pub fn map_number(&self) -> u32 {
        self.map_number
    }

    /// File offset of this map's sub-section; zero until it has been written.
    pub fn index_offset(&self) -> u32 {
        self.index_offset
    }

    pub(crate) fn set_index_offset(&mut self, index_offset: u32) {
        self.index_offset = index_offset;
    }

    pub fn write<W: ImgFileWriter + ?Sized>(
        &self,
        writer: &mut W,
        config: MdrConfig,
    ) -> Result<()> {
        writer.put4(self.map_number)?;
        if !config.for_device {
            writer.put4(self.index_offset)?;
        }
        Ok(())
    }
}

/// Record numbers of one MDR section that belong to a single map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordList {
    section: u8,
    width: u8,
    records: Vec<u32>,
}

impl RecordList {
    fn new(section: u8) -> Self {
        Self {
            section,
            width: 4,
            records: Vec::new(),
        }
    }

    pub fn section(&self) -> u8 {
        self.section
    }

    /// Bytes used to store each record number.
    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn records(&self) -> &[u32] {
        &self.records
    }

    pub fn set_width(&mut self, width: u8) -> Result<()> {
        if !(1..=4).contains(&width) {
            return Err(ImgError::new(
                ImgErrorCode::InvalidFieldValue,
                format!("Record number width must be 1 to 4 bytes, got {width}."),
            ));
        }
        self.width = width;
        Ok(())
    }

    /// Shrinks the width to the fewest bytes that hold every record number.
    pub fn fit_width(&mut self) {
        let max = self.records.iter().copied().max().unwrap_or(0);
        self.width = match max {
            0..=0xff => 1,
            0x100..=0xffff => 2,
            0x1_0000..=0xff_ffff => 3,
            _ => 4,
        };
    }

    pub fn push(&mut self, record: u32) {
        self.records.push(record);
    }

    pub fn byte_len(&self) -> usize {
        self.records.len() * usize::from(self.width)
    }

    fn write<W: ImgFileWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let width = usize::from(self.width);
        for &record in &self.records {
            if width < 4 && record >> (8 * width) != 0 {
                return Err(ImgError::new(
                    ImgErrorCode::InvalidFieldValue,
                    format!(
                        "Record {record} of MDR{} does not fit in {width} bytes.",
                        self.section
                    ),
                ));
            }
            writer.put_bytes(&record.to_le_bytes()[..width])?;
        }
        Ok(())
    }
}

/// The reverse index of one map. Filled in by the builders of the other MDR
/// sections; lists are written in the order they were first requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mdr1SubSection {
    lists: Vec<RecordList>,
}

impl Mdr1SubSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The list for `section`, created empty on first use.
    pub fn list_mut(&mut self, section: u8) -> &mut RecordList {
        let idx = match self.lists.iter().position(|list| list.section == section) {
            Some(idx) => idx,
            None => {
                self.lists.push(RecordList::new(section));
                self.lists.len() - 1
            }
        };
        &mut self.lists[idx]
    }

    pub fn list(&self, section: u8) -> Option<&RecordList> {
        self.lists.iter().find(|list| list.section == section)
    }

    pub fn lists(&self) -> &[RecordList] {
        &self.lists
    }

    pub fn byte_len(&self) -> usize {
        self.lists.iter().map(RecordList::byte_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    pub fn write<W: ImgFileWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for list in &self.lists {
            list.write(writer)?;
        }
        Ok(())
    }
}

/// Builder for the MDR1 section.
///
/// Records and sub-sections are parallel: the n-th registered map owns the
/// n-th sub-section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mdr1 {
    config: MdrConfig,
    maps: Vec<Mdr1Record>,
    sub_sections: Vec<Mdr1SubSection>,
}

impl Mdr1 {
    pub fn new(config: MdrConfig) -> Self {
        Self {
            config,
            maps: Vec::new(),
            sub_sections: Vec::new(),
        }
    }

    pub fn config(&self) -> MdrConfig {
        self.config
    }

    pub fn add_map(&mut self, map_number: u32) -> Result<()> {
        if self.position_of(map_number).is_some() {
            return Err(ImgError::new(
                ImgErrorCode::DuplicateMap,
                format!("Map {map_number} is already registered in MDR1."),
            ));
        }
        self.maps.push(Mdr1Record::new(map_number));
        self.sub_sections.push(Mdr1SubSection::new());
        Ok(())
    }

    pub fn item_size(&self) -> usize {
        let size = self.config.item_size();
        tracing::trace!(for_device = self.config.for_device, size, "MDR1 item size");
        size
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn records(&self) -> &[Mdr1Record] {
        &self.maps
    }

    pub fn record(&self, map_number: u32) -> Option<&Mdr1Record> {
        self.position_of(map_number).map(|idx| &self.maps[idx])
    }

    pub fn sub_section_mut(&mut self, map_number: u32) -> Option<&mut Mdr1SubSection> {
        let idx = self.position_of(map_number)?;
        Some(&mut self.sub_sections[idx])
    }

    pub fn sub_section_at(&self, index: usize) -> Option<&Mdr1SubSection> {
        self.sub_sections.get(index)
    }

    /// Total bytes written by [`Mdr1::write`]. Device sections hold only the
    /// records.
    pub fn section_len(&self) -> usize {
        let records_len = self.maps.len() * self.item_size();
        if self.config.for_device {
            return records_len;
        }
        records_len
            + self
                .sub_sections
                .iter()
                .map(Mdr1SubSection::byte_len)
                .sum::<usize>()
    }

    fn position_of(&self, map_number: u32) -> Option<usize> {
        self.maps
            .iter()
            .position(|record| record.map_number == map_number)
    }

    /// Writes every record in registration order with its current offset.
    pub fn write_records<W: ImgFileWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for record in &self.maps {
            record.write(writer, self.config)?;
        }
        Ok(())
    }

    /// Writes every sub-section, setting each record's offset to the position
    /// its sub-section starts at.
    ///
    /// Device records have no offset field, so nothing is written for a
    /// device target.
    pub fn write_sub_sections<W: ImgFileWriter + ?Sized>(
        &mut self,
        writer: &mut W,
    ) -> Result<()> {
        if self.config.for_device {
            return Ok(());
        }
        for (record, sub) in self.maps.iter_mut().zip(&self.sub_sections) {
            let position = writer.position();
            let offset = u32::try_from(position).map_err(|_| {
                ImgError::new(
                    ImgErrorCode::OffsetOverflow,
                    format!(
                        "Sub-section of map {} starts at {position}, beyond 32 bits.",
                        record.map_number
                    ),
                )
            })?;
            record.set_index_offset(offset);
            sub.write(writer)?;
        }
        Ok(())
    }

    /// Writes the whole section: records, then sub-sections, then the
    /// records again in place now that the offsets are known. Leaves the
    /// writer at the end of the last sub-section. A device section is the
    /// records alone.
    pub fn write<W: ImgFileWriter + ?Sized>(&mut self, writer: &mut W) -> Result<()> {
        let records_start = writer.position();
        self.write_records(writer)?;
        if !self.config.for_device {
            self.write_sub_sections(writer)?;
            let end = writer.position();

            writer.seek(records_start)?;
            self.write_records(writer)?;
            writer.seek(end)?;
        }
        let end = writer.position();

        tracing::debug!(
            maps = self.maps.len(),
            start = records_start,
            end,
            "wrote MDR1 section"
        );
        Ok(())
    }
}
