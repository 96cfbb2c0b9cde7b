//! Store layouts: the text map loader with its symbol table, and the
//! built-in parametric layout used when no map file is given.
//!
//! Map files are plain text, one symbol per cell. Blank lines and lines
//! starting with `#` are comments; short lines are padded with default
//! aisles. Symbol meanings come from a JSON symbol table; a built-in table
//! covers the common symbols.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::TopologyError;
use crate::grid::{Cell, CellKind, Direction, Grid, Position, DEFAULT_AISLE_CAPACITY};

/// Cell kind tag as written in symbol tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolKind {
    Aisle,
    Shelf,
    Checkout,
    Entrance,
    Exit,
    Obstacle,
}

/// One symbol table entry: the kind plus its kind-specific attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolSpec {
    #[serde(rename = "type")]
    pub kind: SymbolKind,
    pub capacity: Option<usize>,
    pub category: Option<String>,
    pub product_id: Option<u32>,
    pub direction: Option<Direction>,
}

impl SymbolSpec {
    fn of_kind(kind: SymbolKind) -> Self {
        Self {
            kind,
            capacity: None,
            category: None,
            product_id: None,
            direction: None,
        }
    }

    fn cell(&self, pos: Position) -> Cell {
        let kind = match self.kind {
            SymbolKind::Aisle => CellKind::Aisle {
                capacity: self.capacity.unwrap_or(DEFAULT_AISLE_CAPACITY).max(1),
                occupants: Vec::new(),
            },
            SymbolKind::Shelf => CellKind::Shelf {
                category: self.category.clone().unwrap_or_else(|| "General".into()),
                product_id: self.product_id,
                direction: self.direction.unwrap_or(Direction::None),
                occupants: Vec::new(),
            },
            SymbolKind::Checkout => CellKind::Checkout {
                queue: Vec::new(),
                remaining_service: 0,
            },
            SymbolKind::Entrance => CellKind::Entrance {
                occupants: Vec::new(),
            },
            SymbolKind::Exit => CellKind::Exit {
                occupants: Vec::new(),
            },
            SymbolKind::Obstacle => CellKind::Obstacle,
        };
        Cell { pos, kind }
    }
}

/// Symbol → cell spec mapping for the text map format.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: HashMap<char, SymbolSpec>,
}

impl Default for SymbolTable {
    /// The built-in table: `.` aisle, `S` generic shelf, `C` checkout,
    /// `E` entrance, `X` exit, `#` obstacle.
    fn default() -> Self {
        let mut symbols = HashMap::new();
        symbols.insert(
            '.',
            SymbolSpec {
                capacity: Some(DEFAULT_AISLE_CAPACITY),
                ..SymbolSpec::of_kind(SymbolKind::Aisle)
            },
        );
        symbols.insert(
            'S',
            SymbolSpec {
                category: Some("General".into()),
                product_id: Some(0),
                direction: Some(Direction::None),
                ..SymbolSpec::of_kind(SymbolKind::Shelf)
            },
        );
        symbols.insert('C', SymbolSpec::of_kind(SymbolKind::Checkout));
        symbols.insert('E', SymbolSpec::of_kind(SymbolKind::Entrance));
        symbols.insert('X', SymbolSpec::of_kind(SymbolKind::Exit));
        symbols.insert('#', SymbolSpec::of_kind(SymbolKind::Obstacle));
        Self { symbols }
    }
}

impl SymbolTable {
    /// Parse a symbol table from its JSON form: an object keyed by
    /// single-character symbols.
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        let raw: HashMap<String, SymbolSpec> = serde_json::from_str(json)?;
        let mut symbols = HashMap::new();
        for (key, spec) in raw {
            if let Some(symbol) = key.chars().next() {
                symbols.insert(symbol, spec);
            }
        }
        Ok(Self { symbols })
    }

    pub fn from_file(path: &Path) -> Result<Self, TopologyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, symbol: char) -> Option<&SymbolSpec> {
        self.symbols.get(&symbol)
    }
}

/// Parse a text map into a grid. Unknown symbols and maps without an
/// entrance are topology errors.
pub fn parse_map(text: &str, symbols: &SymbolTable) -> Result<Grid, TopologyError> {
    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.trim_end_matches(['\r', '\n']))
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .collect();
    if lines.is_empty() {
        return Err(TopologyError::EmptyMap);
    }
    let rows = lines.len();
    let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let mut grid = Grid::new(rows, cols);
    for (row, line) in lines.iter().enumerate() {
        for (col, symbol) in line.chars().enumerate() {
            let spec = symbols
                .get(symbol)
                .ok_or(TopologyError::UnknownSymbol(symbol))?;
            let pos = Position::new(row, col);
            if let Some(cell) = grid.cell_mut(pos) {
                *cell = spec.cell(pos);
            }
        }
        // short lines stay default aisles, matching Grid::new
    }

    if grid.entrance().is_none() {
        return Err(TopologyError::NoEntrance);
    }
    Ok(grid)
}

/// Load a map file, with an optional symbol table file next to it.
pub fn load_map(
    map_path: &Path,
    symbol_path: Option<&Path>,
) -> Result<Grid, TopologyError> {
    let symbols = match symbol_path {
        Some(path) => SymbolTable::from_file(path)?,
        None => SymbolTable::default(),
    };
    let text = std::fs::read_to_string(map_path)?;
    parse_map(&text, &symbols)
}

/// The parametric store layout: entrance top-left, exit bottom-left, shelf
/// runs on both flanks and through the middle, widened main aisles, and a
/// pair of checkouts in the bottom-right corner. Degrades gracefully on
/// small grids; `build_store(10, 12)` is the reference floor used by the
/// default configuration.
pub fn build_store(rows: usize, cols: usize) -> Result<Grid, TopologyError> {
    if rows == 0 || cols == 0 {
        return Err(TopologyError::EmptyMap);
    }
    let mut grid = Grid::new(rows, cols);

    let set = |grid: &mut Grid, pos: Position, kind: CellKind| {
        if let Some(cell) = grid.cell_mut(pos) {
            cell.kind = kind;
        }
    };
    let shelf = |category: &str, product_id: u32| CellKind::Shelf {
        category: category.into(),
        product_id: Some(product_id),
        direction: Direction::None,
        occupants: Vec::new(),
    };

    set(
        &mut grid,
        Position::new(0, 0),
        CellKind::Entrance {
            occupants: Vec::new(),
        },
    );
    set(
        &mut grid,
        Position::new(rows - 1, 0),
        CellKind::Exit {
            occupants: Vec::new(),
        },
    );

    // left flank: dairy
    for i in 1..8.min(rows.saturating_sub(1)) {
        set(&mut grid, Position::new(i, 2), shelf("Dairy", 100 + i as u32));
    }
    // right flank: snacks
    if cols > 9 {
        for i in 1..8.min(rows.saturating_sub(1)) {
            set(&mut grid, Position::new(i, 9), shelf("Snacks", 200 + i as u32));
        }
    }
    // central double run: beverages and bakery
    if cols > 6 {
        for i in 2..7.min(rows.saturating_sub(2)) {
            set(
                &mut grid,
                Position::new(i, 5),
                shelf("Beverages", 300 + i as u32),
            );
            set(&mut grid, Position::new(i, 6), shelf("Bakery", 400 + i as u32));
        }
    }

    // widened main aisles
    let widen = |grid: &mut Grid, pos: Position| {
        if let Some(cell) = grid.cell_mut(pos) {
            if let CellKind::Aisle { capacity, .. } = &mut cell.kind {
                *capacity = 6;
            }
        }
    };
    for i in 0..rows {
        if cols > 4 {
            widen(&mut grid, Position::new(i, 4));
        }
        if cols > 7 {
            widen(&mut grid, Position::new(i, 7));
        }
    }
    if rows >= 2 {
        for j in 0..cols {
            widen(&mut grid, Position::new(rows - 2, j));
        }
    }

    // checkout pair in the bottom-right corner
    if cols >= 2 {
        for j in [cols - 2, cols - 1] {
            set(
                &mut grid,
                Position::new(rows - 1, j),
                CellKind::Checkout {
                    queue: Vec::new(),
                    remaining_service: 0,
                },
            );
        }
    }

    if grid.entrance().is_none() {
        return Err(TopologyError::NoEntrance);
    }
    Ok(grid)
}

/// The 10×12 reference floor.
pub fn reference_layout() -> Result<Grid, TopologyError> {
    build_store(10, 12)
}
