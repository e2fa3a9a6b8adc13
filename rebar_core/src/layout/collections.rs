//! # Piece Collections
//!
//! A [`Container`] owns every piece of one mesh face in an arena and lists
//! the live ones row by row, bottom row first. Rows come straight out of
//! [`Diagram::insert_additional`]: each call produces the next row up.
//!
//! Two regroupings are derived on demand:
//!
//! - [`Stack`]: pieces nested by a subset relation on one of their periods,
//!   innermost (top row) first. Stacks drive the practical and executive
//!   passes.
//! - [`Bunch`]: identical pieces drawn as one label. Bunches are laid out in
//!   drawing rows.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::geometry::{Diagram, Period};
//! use rebar_core::layout::collections::Container;
//! use rebar_core::layout::piece::{Piece, PeriodKind};
//! use rebar_core::materials::{Level, Rebar, RebarType};
//!
//! let mut diagram = Diagram::new(vec![0.0, 1.0, 2.0], vec![0.0, 2.0, 0.0]).unwrap();
//! let rebar = Rebar::with_lengths(RebarType::T16, Level::Bottom, 0.6, 0.8, 0.25);
//! let mut container = Container::new();
//! while diagram.is_positive() {
//!     let row = diagram.insert_additional(1.0).into_iter().map(|p| Piece::new(rebar, p)).collect();
//!     container.add_row(row);
//! }
//! let stacks = container.get_stacks(PeriodKind::Theoretical, &diagram);
//! assert_eq!(stacks.len(), 1);
//! assert_eq!(stacks[0].len(), 2);
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::geometry::{Diagram, Period};
use crate::layout::piece::{Piece, PieceId, PeriodKind};
use crate::rounding::round_to;

// ============================================================================
// Stack
// ============================================================================

/// Nested pieces, innermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub peak_station: f64,
    pieces: Vec<PieceId>,
}

impl Stack {
    pub fn new(peak_station: f64) -> Self {
        Stack { peak_station, pieces: Vec::new() }
    }

    /// Pieces are added top to bottom, so each one contains the previous.
    pub fn add_piece(&mut self, id: PieceId) {
        self.pieces.push(id);
    }

    pub fn pieces(&self) -> &[PieceId] {
        &self.pieces
    }

    pub fn last(&self) -> Option<PieceId> {
        self.pieces.last().copied()
    }

    pub fn contains(&self, id: PieceId) -> bool {
        self.pieces.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

// ============================================================================
// Bunch
// ============================================================================

/// Handle to a bunch within one drawing-data call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BunchId(pub usize);

/// Identical pieces drawn once with a count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bunch {
    pub id: BunchId,
    pieces: Vec<PieceId>,
}

impl Bunch {
    pub fn new(id: BunchId) -> Self {
        Bunch { id, pieces: Vec::new() }
    }

    pub fn add(&mut self, piece: PieceId) {
        self.pieces.push(piece);
    }

    pub fn pieces(&self) -> &[PieceId] {
        &self.pieces
    }

    pub fn count(&self) -> usize {
        self.pieces.len()
    }
}

// ============================================================================
// Container
// ============================================================================

/// Arena of pieces plus the rows that are currently live.
///
/// Pieces replaced by unification stay in the arena so their ids stay valid,
/// but they are no longer listed in any row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    pieces: Vec<Piece>,
    rows: Vec<Vec<PieceId>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row above the existing ones.
    pub fn add_row(&mut self, row: Vec<Piece>) -> Vec<PieceId> {
        let ids: Vec<PieceId> = row.into_iter().map(|piece| self.insert(piece)).collect();
        self.rows.push(ids.clone());
        ids
    }

    /// Put a piece in the arena without listing it in a row.
    pub fn insert(&mut self, piece: Piece) -> PieceId {
        self.pieces.push(piece);
        PieceId(self.pieces.len() - 1)
    }

    pub fn rows(&self) -> &[Vec<PieceId>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Replace `row[range]` with `pieces`.
    pub fn replace_in_row(&mut self, row: usize, range: std::ops::Range<usize>, pieces: Vec<PieceId>) {
        self.rows[row].splice(range, pieces);
    }

    pub fn piece(&self, id: PieceId) -> &Piece {
        &self.pieces[id.0]
    }

    pub fn piece_mut(&mut self, id: PieceId) -> &mut Piece {
        &mut self.pieces[id.0]
    }

    /// Live piece ids, bottom row first.
    pub fn piece_ids(&self) -> Vec<PieceId> {
        self.rows.iter().flatten().copied().collect()
    }

    /// Live pieces, bottom row first.
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.rows.iter().flatten().map(move |id| &self.pieces[id.0])
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Group live pieces into stacks by the subset relation on `by`.
    ///
    /// Rows are scanned top to bottom. A piece joins the first stack whose
    /// outermost piece fits inside it; otherwise it opens a new stack peaked
    /// at the diagram's maximum within the piece's period.
    pub fn get_stacks(&self, by: PeriodKind, diagram: &Diagram) -> Vec<Stack> {
        let mut stacks: Vec<Stack> = Vec::new();
        for row in self.rows.iter().rev() {
            for &id in row {
                let period = self.piece(id).period(by);
                let home = stacks.iter_mut().find(|stack| {
                    stack
                        .last()
                        .is_some_and(|last| self.piece(last).period(by).is_subset_of(&period))
                });
                match home {
                    Some(stack) => stack.add_piece(id),
                    None => {
                        let mut stack = Stack::new(peak_station(diagram, &period));
                        stack.add_piece(id);
                        stacks.push(stack);
                    }
                }
            }
        }
        stacks
    }

    /// Bunches of identical pieces laid out in drawing rows.
    ///
    /// Each executive stack is walked outermost first. Consecutive pieces
    /// with the same shortest bar length share a bunch, and every new bunch
    /// goes one drawing row higher than the previous one of its stack. The
    /// bunches of a drawing row are sorted by start station.
    pub fn get_drawing_data(&self, diagram: &Diagram) -> Vec<Vec<Bunch>> {
        let mut bunches: Vec<Bunch> = Vec::new();
        let mut bunch_row: Vec<usize> = Vec::new();
        let mut assigned: HashMap<PieceId, BunchId> = HashMap::new();

        for stack in self.get_stacks(PeriodKind::Executive, diagram) {
            let mut row_index = 0;
            let mut own: Vec<BunchId> = Vec::new();
            let mut seen: Vec<BunchId> = Vec::new();
            for &id in stack.pieces().iter().rev() {
                match assigned.get(&id) {
                    None => {
                        let length = self.manufactured_key(id);
                        let joined = own.last().copied().filter(|last| {
                            bunches[last.0].pieces().last().is_some_and(|&p| self.manufactured_key(p) == length)
                        });
                        let bunch_id = match joined {
                            Some(bunch_id) => bunch_id,
                            None => {
                                let bunch_id = BunchId(bunches.len());
                                bunches.push(Bunch::new(bunch_id));
                                bunch_row.push(row_index);
                                own.push(bunch_id);
                                row_index += 1;
                                bunch_id
                            }
                        };
                        bunches[bunch_id.0].add(id);
                        assigned.insert(id, bunch_id);
                    }
                    Some(&bunch_id) => {
                        if !seen.contains(&bunch_id) {
                            seen.push(bunch_id);
                            row_index += 1;
                        }
                    }
                }
            }
        }

        let mut by_row: BTreeMap<usize, Vec<Bunch>> = BTreeMap::new();
        for (bunch, row) in bunches.into_iter().zip(bunch_row) {
            by_row.entry(row).or_default().push(bunch);
        }
        by_row
            .into_values()
            .map(|mut row| {
                row.sort_by(|a, b| self.first_start(a).total_cmp(&self.first_start(b)));
                row
            })
            .collect()
    }

    fn manufactured_key(&self, id: PieceId) -> i64 {
        (round_to(self.piece(id).shortest_length(PeriodKind::Executive), 3) * 1000.0).round() as i64
    }

    fn first_start(&self, bunch: &Bunch) -> f64 {
        bunch.pieces().first().map_or(0.0, |&id| self.piece(id).executive.start)
    }
}

fn peak_station(diagram: &Diagram, period: &Period) -> f64 {
    diagram.max_point(period).map_or(period.start, |p| p.station)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{Level, Rebar, RebarType};

    fn rebar() -> Rebar {
        Rebar::with_lengths(RebarType::T20, Level::Bottom, 1.0, 1.3, 0.3)
    }

    fn diagram() -> Diagram {
        Diagram::new(
            (0..10).map(f64::from).collect(),
            vec![3.0, 0.0, 0.0, 0.0, 5.0, 4.0, 3.0, 1.0, 0.0, 4.0],
        )
        .unwrap()
    }

    fn piece(start: f64, end: f64) -> Piece {
        Piece::new(rebar(), Period::new(start, end))
    }

    fn filled_container() -> (Container, Diagram) {
        let mut diagram = diagram();
        let mut container = Container::new();
        while diagram.is_positive() {
            let row = diagram.insert_additional(1.0).into_iter().map(|p| Piece::new(rebar(), p)).collect();
            container.add_row(row);
        }
        (container, diagram)
    }

    fn bunched_container() -> Container {
        let mut container = Container::new();
        container.add_row(vec![piece(0.0, 3.0), piece(2.0, 9.0)]);
        container.add_row(vec![piece(0.0, 2.0), piece(2.0, 9.0)]);
        container.add_row(vec![piece(0.0, 2.0), piece(2.0, 5.0), piece(6.0, 8.0)]);
        container.add_row(vec![piece(0.0, 2.0), piece(2.0, 5.0)]);
        container.add_row(vec![piece(2.0, 4.0)]);
        container.add_row(vec![piece(2.0, 4.0)]);
        container.add_row(vec![piece(2.0, 3.0)]);
        container
    }

    #[test]
    fn test_stack_length() {
        let mut stack = Stack::new(10.0);
        stack.add_piece(PieceId(0));
        stack.add_piece(PieceId(1));
        stack.add_piece(PieceId(2));
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.last(), Some(PieceId(2)));
    }

    #[test]
    fn test_bunch_count() {
        let mut bunch = Bunch::new(BunchId(0));
        bunch.add(PieceId(3));
        bunch.add(PieceId(4));
        assert_eq!(bunch.count(), 2);
    }

    #[test]
    fn test_rows_and_pieces() {
        let (container, _) = filled_container();
        assert_eq!(container.row_count(), 5);
        assert_eq!(container.len(), 11);
        assert_eq!(container.pieces().count(), 11);
        assert_eq!(container.piece(container.rows()[0][1]).theoretical, Period::new(3.0, 9.0));
    }

    #[test]
    fn test_get_stacks() {
        let (container, diagram) = filled_container();
        let stacks = container.get_stacks(PeriodKind::Executive, &diagram);
        assert_eq!(stacks.len(), 3);
        assert_eq!(stacks[0].len(), 5);
        assert_eq!(stacks[0].peak_station, 4.0);
        assert_eq!(stacks[1].len(), 3);
        assert_eq!(stacks[1].peak_station, 9.0);
        assert_eq!(stacks[2].len(), 3);
        assert_eq!(stacks[2].peak_station, 0.0);
    }

    #[test]
    fn test_each_piece_in_one_stack() {
        let container = bunched_container();
        let stacks = container.get_stacks(PeriodKind::Executive, &diagram());
        let total: usize = stacks.iter().map(Stack::len).sum();
        assert_eq!(total, container.len());
    }

    #[test]
    fn test_replace_in_row_keeps_arena() {
        let mut container = bunched_container();
        let merged = container.insert(piece(0.0, 5.0));
        container.replace_in_row(3, 0..2, vec![merged]);
        assert_eq!(container.rows()[3], vec![merged]);
        assert_eq!(container.len(), 11);
        assert_eq!(container.piece(PieceId(0)).theoretical, Period::new(0.0, 3.0));
    }

    #[test]
    fn test_drawing_data() {
        let container = bunched_container();
        let rows = container.get_drawing_data(&diagram());
        let counts: Vec<Vec<usize>> = rows.iter().map(|row| row.iter().map(Bunch::count).collect()).collect();
        assert_eq!(counts, vec![vec![1, 2, 1], vec![3, 2], vec![2], vec![1]]);
        let starts: Vec<f64> = rows[0].iter().map(|b| container.piece(b.pieces()[0]).executive.start).collect();
        assert_eq!(starts, vec![0.0, 2.0, 6.0]);
    }
}
