use std::fmt;

use lnpoker_game::model::TableId;

/// The two screens: `/` is the lobby, `/{tableId}` a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Route {
    #[default]
    Lobby,
    Table(TableId),
}

impl Route {
    /// Parse a path. Anything deeper than one segment is not a route.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.trim().trim_start_matches('/').trim_end_matches('/');
        if path.is_empty() {
            Some(Route::Lobby)
        } else if path.contains('/') {
            None
        } else {
            Some(Route::Table(TableId::from(path)))
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Lobby => f.write_str("/"),
            Route::Table(id) => write!(f, "/{}", id),
        }
    }
}
