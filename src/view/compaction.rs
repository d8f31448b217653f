use crate::view::cell::Cell;

/// Shift occupied cells to the front, keeping their relative order.
///
/// Two cursors walk the cells once: `empty` stops at each gap and `full`
/// (never behind `empty`) finds the next occupied cell to pull into it.
/// Neither cursor moves backwards, so at most `cells.len()` moves happen.
/// Returns the number of moves.
pub fn compact(cells: &mut [Cell]) -> usize {
    let mut moves = 0;
    let mut full = 0;
    for empty in 0..cells.len() {
        if !cells[empty].is_empty() {
            continue;
        }
        full = full.max(empty + 1);
        while full < cells.len() && cells[full].is_empty() {
            full += 1;
        }
        if full >= cells.len() {
            break;
        }
        let (head, tail) = cells.split_at_mut(full);
        tail[0].move_to(&mut head[empty]);
        moves += 1;
    }
    moves
}

/// True when no empty cell precedes an occupied one.
pub fn is_compacted(cells: &[Cell]) -> bool {
    match cells.iter().position(Cell::is_empty) {
        Some(first_gap) => cells[first_gap..].iter().all(Cell::is_empty),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::{EntityHandle, ItemId, ItemTypeId};

    fn cells(layout: &[Option<u32>]) -> Vec<Cell> {
        layout
            .iter()
            .map(|slot| {
                let mut cell = Cell::default();
                if let Some(id) = slot {
                    cell.set_entity(Some(EntityHandle::new(ItemId(*id), ItemTypeId(1), "item")));
                }
                cell
            })
            .collect()
    }

    fn ids(cells: &[Cell]) -> Vec<Option<u32>> {
        cells.iter().map(|cell| cell.item_id().map(|id| id.0)).collect()
    }

    #[test]
    fn single_gap_is_closed() {
        let mut grid = cells(&[Some(1), None, Some(3), None]);
        assert_eq!(compact(&mut grid), 1);
        assert_eq!(ids(&grid), vec![Some(1), Some(3), None, None]);
    }

    #[test]
    fn order_survives_scattered_gaps() {
        let mut grid = cells(&[None, Some(2), None, None, Some(5), Some(6), None, Some(8)]);
        compact(&mut grid);
        assert_eq!(
            ids(&grid),
            vec![Some(2), Some(5), Some(6), Some(8), None, None, None, None]
        );
        assert!(is_compacted(&grid));
    }

    #[test]
    fn compacted_grid_is_untouched() {
        let mut grid = cells(&[Some(1), Some(2), None, None]);
        assert_eq!(compact(&mut grid), 0);
        assert_eq!(ids(&grid), vec![Some(1), Some(2), None, None]);
    }

    #[test]
    fn empty_and_full_grids() {
        let mut empty = cells(&[None, None, None]);
        assert_eq!(compact(&mut empty), 0);
        let mut full = cells(&[Some(1), Some(2)]);
        assert_eq!(compact(&mut full), 0);
        let mut nothing: Vec<Cell> = Vec::new();
        assert_eq!(compact(&mut nothing), 0);
    }

    #[test]
    fn moves_never_exceed_cell_count() {
        let layout: Vec<Option<u32>> = (0..32)
            .map(|index| if index % 3 == 0 { None } else { Some(index) })
            .collect();
        let mut grid = cells(&layout);
        let before: Vec<u32> = layout.iter().flatten().copied().collect();
        let moves = compact(&mut grid);
        assert!(moves <= grid.len());
        let after: Vec<u32> = ids(&grid).into_iter().flatten().collect();
        assert_eq!(before, after);
        assert!(is_compacted(&grid));
    }
}
