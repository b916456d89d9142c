//! The subdivision tree of one map.
//!
//! Nodes live in an arena owned by [`SubdivisionTree`] and refer to their
//! children by [`SubdivisionId`]. Construction, numbering and writing are
//! separate phases: create the nodes, call [`SubdivisionTree::number`], then
//! [`SubdivisionTree::write`]. Creating a node after numbering discards the
//! numbering.

use crate::encoder::subdivision_record_length;
use crate::{
    Area, FeatureSet, ImgError, ImgErrorCode, ImgFileWriter, Result, Subdivision,
    SubdivisionRecord, Zoom, ZoomCatalog,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubdivisionId(usize);

impl SubdivisionId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct SubdivisionTree {
    zooms: ZoomCatalog,
    nodes: Vec<Subdivision>,
    top_levels: Vec<SubdivisionId>,
    order: Option<Vec<SubdivisionId>>,
}

impl SubdivisionTree {
    pub fn new(zooms: ZoomCatalog) -> Self {
        Self {
            zooms,
            nodes: Vec::new(),
            top_levels: Vec::new(),
            order: None,
        }
    }

    pub fn zooms(&self) -> &ZoomCatalog {
        &self.zooms
    }

    /// Creates a subdivision covering the whole map.
    ///
    /// `zoom` must be the coarsest level of the map. The new node has no
    /// contents.
    pub fn create_top_level(&mut self, area: Area, zoom: Zoom) -> Result<SubdivisionId> {
        let coarsest = self.zooms.coarsest();
        if zoom != coarsest {
            return Err(ImgError::new(
                ImgErrorCode::InvalidZoomLevel,
                format!(
                    "Top-level subdivision must use coarsest level {}, got level {}.",
                    coarsest.level(),
                    zoom.level()
                ),
            ));
        }

        let id = self.insert(Subdivision::new(area, zoom)?);
        self.top_levels.push(id);
        Ok(id)
    }

    /// Creates a subdivision one level finer than `parent` and appends it to
    /// the parent's children.
    pub fn create_child(
        &mut self,
        parent: SubdivisionId,
        area: Area,
        zoom: Zoom,
    ) -> Result<SubdivisionId> {
        let parent_zoom = self.get(parent)?.zoom();
        let expected = parent_zoom
            .level()
            .checked_sub(1)
            .and_then(|level| self.zooms.get(level));
        if expected != Some(zoom) {
            return Err(ImgError::new(
                ImgErrorCode::InvalidZoomLevel,
                format!(
                    "Child of a level {} subdivision must use the next finer level, got level {}.",
                    parent_zoom.level(),
                    zoom.level()
                ),
            ));
        }

        let child = Subdivision::new(area, zoom)?;
        let id = self.insert(child);
        self.nodes[parent.0].attach_child(id);
        Ok(id)
    }

    fn insert(&mut self, node: Subdivision) -> SubdivisionId {
        if self.order.take().is_some() {
            self.nodes.iter_mut().for_each(Subdivision::clear_numbering);
        }
        let id = SubdivisionId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: SubdivisionId) -> Result<&Subdivision> {
        self.nodes.get(id.0).ok_or_else(|| unknown(id))
    }

    fn get_mut(&mut self, id: SubdivisionId) -> Result<&mut Subdivision> {
        self.nodes.get_mut(id.0).ok_or_else(|| unknown(id))
    }

    pub fn set_rgn_pointer(&mut self, id: SubdivisionId, rgn_pointer: u32) -> Result<()> {
        self.get_mut(id)?.set_rgn_pointer(rgn_pointer)
    }

    /// Records which element kinds the RGN section holds for `id`.
    pub fn set_contents(&mut self, id: SubdivisionId, contents: FeatureSet) -> Result<()> {
        self.get_mut(id)?.set_contents(contents);
        Ok(())
    }

    pub fn top_levels(&self) -> &[SubdivisionId] {
        &self.top_levels
    }

    pub fn children(&self, id: SubdivisionId) -> Result<&[SubdivisionId]> {
        Ok(self.get(id)?.children())
    }

    /// Subdivisions at `level` in creation order.
    pub fn subdivisions_at(&self, level: u8) -> impl Iterator<Item = SubdivisionId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.zoom().level() == level)
            .map(|(idx, _)| SubdivisionId(idx))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_numbered(&self) -> bool {
        self.order.is_some()
    }

    /// Assigns sequence numbers in level order, starting at 1.
    ///
    /// Each parent's children receive consecutive numbers in the order they
    /// were created, so a reader finds all siblings from the first child's
    /// number. The final child of every parent, and the final top-level
    /// subdivision, are marked last.
    pub fn number(&mut self) -> Result<()> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut level = self.top_levels.clone();
        while !level.is_empty() {
            let next: Vec<SubdivisionId> = level
                .iter()
                .flat_map(|id| self.nodes[id.0].children().iter().copied())
                .collect();
            order.append(&mut level);
            level = next;
        }

        if order.len() > usize::from(u16::MAX) {
            return Err(ImgError::new(
                ImgErrorCode::TooManySubdivisions,
                format!(
                    "{} subdivisions cannot be numbered with 16 bits.",
                    order.len()
                ),
            ));
        }

        let mut last = vec![false; self.nodes.len()];
        if let Some(id) = self.top_levels.last() {
            last[id.0] = true;
        }
        for node in &self.nodes {
            if let Some(id) = node.children().last() {
                last[id.0] = true;
            }
        }

        for (idx, id) in order.iter().enumerate() {
            // Fits: the count was checked against u16::MAX above.
            let number = (idx + 1) as u16;
            self.nodes[id.0].set_numbering(number, last[id.0]);
        }

        tracing::debug!(
            subdivisions = order.len(),
            top_levels = self.top_levels.len(),
            "numbered subdivisions"
        );
        self.order = Some(order);
        Ok(())
    }

    /// Subdivisions in sequence-number order.
    pub fn numbered(&self) -> Result<&[SubdivisionId]> {
        self.order.as_deref().ok_or_else(|| {
            ImgError::new(
                ImgErrorCode::NotNumbered,
                "Subdivisions must be numbered before they are written.",
            )
        })
    }

    /// The record that will be written for `id`.
    pub fn record(&self, id: SubdivisionId) -> Result<SubdivisionRecord> {
        let node = self.get(id)?;
        self.numbered()?;
        let next_level = node
            .children()
            .first()
            .map(|first| self.nodes[first.0].number());
        Ok(node.record(next_level))
    }

    pub fn record_size(&self, id: SubdivisionId) -> Result<usize> {
        Ok(subdivision_record_length(self.get(id)?.has_children()))
    }

    /// Total size of all subdivision records.
    pub fn section_len(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| subdivision_record_length(node.has_children()))
            .sum()
    }

    pub fn write_subdivision<W: ImgFileWriter + ?Sized>(
        &self,
        id: SubdivisionId,
        writer: &mut W,
    ) -> Result<()> {
        let record = self.record(id)?;
        let node = &self.nodes[id.0];
        tracing::debug!(
            number = node.number(),
            level = node.zoom().level(),
            last = node.is_last(),
            "writing subdivision"
        );
        record.write(writer)
    }

    /// Writes every subdivision in sequence-number order.
    pub fn write<W: ImgFileWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for &id in self.numbered()? {
            self.write_subdivision(id, writer)?;
        }
        Ok(())
    }
}

fn unknown(id: SubdivisionId) -> ImgError {
    ImgError::new(
        ImgErrorCode::UnknownSubdivision,
        format!("No subdivision with index {}.", id.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_subdivision, BufferWriter, FeatureKind};

    fn catalog() -> ZoomCatalog {
        ZoomCatalog::new([
            Zoom::new(0, 24).expect("zoom"),
            Zoom::new(1, 22).expect("zoom"),
            Zoom::new(2, 20).expect("zoom"),
        ])
        .expect("catalog")
    }

    fn level(tree: &SubdivisionTree, level: u8) -> Zoom {
        tree.zooms().get(level).expect("level")
    }

    fn map_area() -> Area {
        Area::new(0, 0, 0x40000, 0x40000)
    }

    #[test]
    fn top_level_requires_coarsest_zoom() {
        let mut tree = SubdivisionTree::new(catalog());
        let err = tree
            .create_top_level(map_area(), level(&tree, 1))
            .expect_err("not coarsest");
        assert_eq!(err.code, ImgErrorCode::InvalidZoomLevel);

        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top level");
        assert!(tree.get(top).expect("node").contents().is_empty());
        assert_eq!(tree.top_levels(), &[top]);
    }

    #[test]
    fn child_requires_next_finer_zoom() {
        let mut tree = SubdivisionTree::new(catalog());
        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top level");

        for wrong in [0, 2] {
            let err = tree
                .create_child(top, map_area(), level(&tree, wrong))
                .expect_err("wrong level");
            assert_eq!(err.code, ImgErrorCode::InvalidZoomLevel);
        }
        assert!(tree.children(top).expect("children").is_empty());

        let child = tree
            .create_child(top, map_area(), level(&tree, 1))
            .expect("child");
        assert_eq!(tree.children(top).expect("children"), &[child]);
    }

    #[test]
    fn finest_level_has_no_children() {
        let mut tree = SubdivisionTree::new(catalog());
        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top");
        let mid = tree
            .create_child(top, map_area(), level(&tree, 1))
            .expect("mid");
        let leaf = tree
            .create_child(mid, map_area(), level(&tree, 0))
            .expect("leaf");

        let finest = level(&tree, 0);
        let err = tree
            .create_child(leaf, map_area(), finest)
            .expect_err("nothing finer");
        assert_eq!(err.code, ImgErrorCode::InvalidZoomLevel);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut tree = SubdivisionTree::new(catalog());
        let zoom = level(&tree, 1);
        let err = tree
            .create_child(SubdivisionId(9), map_area(), zoom)
            .expect_err("unknown");
        assert_eq!(err.code, ImgErrorCode::UnknownSubdivision);
    }

    #[test]
    fn numbering_keeps_siblings_contiguous() {
        let mut tree = SubdivisionTree::new(catalog());
        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top");
        let a = tree
            .create_child(top, map_area(), level(&tree, 1))
            .expect("a");
        let b = tree
            .create_child(top, map_area(), level(&tree, 1))
            .expect("b");
        // Interleave grandchildren so creation order differs from level order.
        let b1 = tree
            .create_child(b, map_area(), level(&tree, 0))
            .expect("b1");
        let a1 = tree
            .create_child(a, map_area(), level(&tree, 0))
            .expect("a1");
        let a2 = tree
            .create_child(a, map_area(), level(&tree, 0))
            .expect("a2");

        tree.number().expect("number");

        let numbers: Vec<u16> = [top, a, b, a1, a2, b1]
            .iter()
            .map(|id| tree.get(*id).expect("node").number())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);

        let last: Vec<bool> = [top, a, b, a1, a2, b1]
            .iter()
            .map(|id| tree.get(*id).expect("node").is_last())
            .collect();
        assert_eq!(last, vec![true, false, true, false, true, true]);

        assert_eq!(tree.record(a).expect("record").next_level, Some(4));
        assert_eq!(tree.record(b).expect("record").next_level, Some(6));
        assert_eq!(tree.record(a1).expect("record").next_level, None);
        assert_eq!(
            tree.subdivisions_at(0).collect::<Vec<_>>(),
            vec![b1, a1, a2]
        );
    }

    #[test]
    fn write_requires_numbering() {
        let mut tree = SubdivisionTree::new(catalog());
        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top");
        tree.create_child(top, map_area(), level(&tree, 1))
            .expect("child");

        let err = tree
            .write(&mut BufferWriter::new())
            .expect_err("not numbered");
        assert_eq!(err.code, ImgErrorCode::NotNumbered);

        tree.number().expect("number");
        assert!(tree.is_numbered());
        tree.create_child(top, map_area(), level(&tree, 1))
            .expect("late child");
        assert!(!tree.is_numbered());
        assert_eq!(tree.get(top).expect("top").number(), 0);
    }

    #[test]
    fn leaf_write_requires_numbering() {
        let mut tree = SubdivisionTree::new(catalog());
        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top");

        let err = tree
            .write_subdivision(top, &mut BufferWriter::new())
            .expect_err("not numbered");
        assert_eq!(err.code, ImgErrorCode::NotNumbered);

        tree.number().expect("number");
        let mut writer = BufferWriter::new();
        tree.write_subdivision(top, &mut writer).expect("write");
        assert!(decode_subdivision(writer.as_bytes(), false).expect("decode").last);
    }

    #[test]
    fn numbering_is_limited_to_16_bits() {
        let mut tree = SubdivisionTree::new(catalog());
        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top");
        let zoom = level(&tree, 1);
        let point = Area::new(0, 0, 0, 0);
        for _ in 1..usize::from(u16::MAX) {
            tree.create_child(top, point, zoom).expect("child");
        }
        assert_eq!(tree.len(), usize::from(u16::MAX));
        tree.number().expect("65535 subdivisions fit");
        let final_id = *tree.numbered().expect("order").last().expect("final");
        assert_eq!(tree.get(final_id).expect("node").number(), u16::MAX);

        tree.create_child(top, point, zoom).expect("one more");
        let err = tree.number().expect_err("too many");
        assert_eq!(err.code, ImgErrorCode::TooManySubdivisions);
        assert!(!tree.is_numbered());
    }

    #[test]
    fn writes_all_records_in_sequence_order() {
        let mut tree = SubdivisionTree::new(catalog());
        let top = tree
            .create_top_level(map_area(), level(&tree, 2))
            .expect("top");
        let child = tree
            .create_child(top, Area::new(0, 0, 0x20000, 0x20000), level(&tree, 1))
            .expect("child");
        tree.set_rgn_pointer(child, 0x40).expect("pointer");
        tree.set_contents(
            child,
            FeatureSet::new([FeatureKind::Polylines, FeatureKind::Polygons]),
        )
        .expect("contents");
        tree.number().expect("number");

        let mut writer = BufferWriter::new();
        tree.write(&mut writer).expect("write");
        assert_eq!(writer.len(), tree.section_len());
        assert_eq!(writer.len(), 16 + 14);

        let bytes = writer.as_bytes();
        let top_record = decode_subdivision(&bytes[..16], true).expect("top");
        assert_eq!(top_record.next_level, Some(2));
        assert!(top_record.last);
        assert_eq!(u32::from(top_record.width), (0x40000u32 / 2) >> 4);

        let child_record = decode_subdivision(&bytes[16..], false).expect("child");
        assert_eq!(child_record.rgn_pointer, 0x40);
        assert_eq!(child_record.contents.type_byte(), 0xc0);
        assert_eq!(u32::from(child_record.width), (0x20000u32 / 2) >> 2);
        assert!(child_record.last);
        assert_eq!(tree.record_size(child).expect("size"), 14);
    }
}
