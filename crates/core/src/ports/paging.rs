//! Relay-style cursor pagination engine.
//!
//! Every paginated repository funnels through this module. It has three
//! pieces:
//!
//! - **Cursor codec** - opaque string cursors encoding a monotonic integer
//!   position ([`encode_cursor`] / [`decode_cursor`]).
//! - **Paging context resolver** - translates `{first, after}` /
//!   `{last, before}` arguments into a concrete [`PagingCtx`]
//!   ([`Pager::resolve`]).
//! - **Page assembler** - turns fetched rows plus the dataset's min/max
//!   bounds into a [`Connection`] with correct page-info flags
//!   ([`assemble`]).
//!
//! [`Pager::connect`] drives all three around a caller-supplied entity
//! finder. The engine never touches the store itself; it is a pure
//! function of its inputs, so concurrent calls share nothing.

use std::future::Future;

use thiserror::Error;

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Ceiling applied to `first`/`last` regardless of the configured default.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Boundary cursor for forward paging with no usable `after` cursor.
/// Positions are assigned from a 1-based sequence, so `cursor > 0` spans
/// the whole set.
pub const START_OF_SET: i64 = 0;

/// Boundary cursor for backward paging with no usable `before` cursor.
pub const END_OF_SET: i64 = i64::MAX;

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

/// Invalid paging arguments. These indicate caller bugs and are surfaced
/// as rejected requests, never silently repaired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PagingError {
    /// `first`/`last` must be a positive integer.
    #[error("first/last must be a positive integer, got {0}")]
    NonPositiveLimit(i64),

    /// Forward (`first`/`after`) and backward (`last`/`before`) arguments
    /// were supplied in the same request.
    #[error("cannot combine forward (first/after) and backward (last/before) paging arguments")]
    ConflictingDirections,
}

// -----------------------------------------------------------------------------
// Request types
// -----------------------------------------------------------------------------

/// Paging direction resolved from the request arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingType {
    /// Ascending from `after`, limited to `first`.
    Forward,
    /// Descending from `before`, limited to `last`.
    Backward,
}

/// Client-supplied paging request, straight from GraphQL variables.
///
/// At most one of the `{first, after}` / `{last, before}` pairs may be
/// used; supplying both is rejected by [`Pager::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub first: Option<i64>,
    pub after: Option<String>,
    pub last: Option<i64>,
    pub before: Option<String>,
}

/// Resolved internal paging request, derived per call and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingCtx {
    /// Exclusive boundary position: `> cursor` forward, `< cursor` backward.
    pub cursor: i64,
    pub limit: i64,
    pub paging_type: PagingType,
}

// -----------------------------------------------------------------------------
// Result types
// -----------------------------------------------------------------------------

/// Any row with a unique, strictly monotonic integer position assigned
/// at creation.
pub trait PagingEntity {
    fn cursor(&self) -> i64;
}

/// What an entity finder hands back: one page worth of rows in fetch
/// order (ascending for forward paging, descending for backward), plus
/// the min/max positions over the *filtered* dataset. The bounds are
/// ignored when `rows` is empty.
#[derive(Debug, Clone)]
pub struct PageRows<T> {
    pub rows: Vec<T>,
    pub min: i64,
    pub max: i64,
}

/// A single entity plus its cursor within a [`Connection`].
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

/// Boundary metadata for a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// Paginated result envelope: edges in ascending cursor order plus
/// page info. This is the terminal, serialized response shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

// -----------------------------------------------------------------------------
// Cursor codec
// -----------------------------------------------------------------------------

/// Encode a position as an opaque cursor string.
pub fn encode_cursor(position: i64) -> String {
    position.to_string()
}

/// Decode a client-supplied cursor.
///
/// Malformed, negative, or absent cursors degrade to `default` (the
/// start or end boundary, per direction) instead of failing the request.
/// Clients hold cursors across deploys and data changes; a stale or
/// tampered bookmark must not take the whole query down.
pub fn decode_cursor(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&position| position >= 0)
        .unwrap_or(default)
}

// -----------------------------------------------------------------------------
// Pager
// -----------------------------------------------------------------------------

/// Paging context resolver and page driver.
///
/// A `Pager` carries the default page size for one repository. It is an
/// explicit configuration value constructed alongside the repository,
/// not shared global state.
#[derive(Debug, Clone)]
pub struct Pager {
    default_limit: i64,
    max_limit: i64,
}

impl Pager {
    /// Create a pager with the given default page size and the standard
    /// ceiling of [`MAX_PAGE_LIMIT`].
    pub fn new(default_limit: i64) -> Self {
        Self {
            default_limit,
            max_limit: MAX_PAGE_LIMIT,
        }
    }

    /// Override the page-size ceiling.
    pub fn with_max_limit(mut self, max_limit: i64) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Resolve request arguments into a concrete query contract.
    ///
    /// Rules:
    /// 1. No arguments: forward from the start, default limit.
    /// 2. `first`/`after` alone: forward, `cursor > decode(after)`.
    /// 3. `last`/`before` alone: backward, `cursor < decode(before)`.
    /// 4. Non-positive `first`/`last`: rejected, never clamped upward.
    ///    Values above the ceiling are clamped down to it.
    /// 5. Both pairs at once: rejected.
    pub fn resolve(&self, args: &ConnectionArgs) -> Result<PagingCtx, PagingError> {
        let forward = args.first.is_some() || args.after.is_some();
        let backward = args.last.is_some() || args.before.is_some();

        if forward && backward {
            return Err(PagingError::ConflictingDirections);
        }

        let paging_type = if backward {
            PagingType::Backward
        } else {
            PagingType::Forward
        };

        let requested = match paging_type {
            PagingType::Forward => args.first,
            PagingType::Backward => args.last,
        }
        .unwrap_or(self.default_limit);

        if requested <= 0 {
            return Err(PagingError::NonPositiveLimit(requested));
        }

        let cursor = match paging_type {
            PagingType::Forward => decode_cursor(args.after.as_deref(), START_OF_SET),
            PagingType::Backward => decode_cursor(args.before.as_deref(), END_OF_SET),
        };

        Ok(PagingCtx {
            cursor,
            limit: requested.min(self.max_limit),
            paging_type,
        })
    }

    /// Resolve the request, run the entity finder once, and assemble the
    /// connection.
    ///
    /// The finder receives the resolved [`PagingCtx`] and must return
    /// rows in fetch order together with the filtered dataset's bounds.
    /// Finder failures propagate unchanged - pagination is read-only and
    /// idempotent, so retries belong to the request boundary, not here.
    pub async fn connect<T, E, F, Fut>(
        &self,
        args: &ConnectionArgs,
        find: F,
    ) -> Result<Connection<T>, E>
    where
        T: PagingEntity,
        E: From<PagingError>,
        F: FnOnce(PagingCtx) -> Fut,
        Fut: Future<Output = Result<PageRows<T>, E>>,
    {
        let ctx = self.resolve(args).map_err(E::from)?;
        let page = find(ctx).await?;
        Ok(assemble(page, ctx.paging_type))
    }
}

// -----------------------------------------------------------------------------
// Page assembler
// -----------------------------------------------------------------------------

/// Assemble a [`Connection`] from one page of rows and the dataset bounds.
///
/// Backward pages arrive in descending fetch order and are reversed here,
/// so edges are always emitted in ascending cursor order regardless of
/// direction. Pure function of its inputs; never mutates the store.
pub fn assemble<T: PagingEntity>(mut page: PageRows<T>, paging_type: PagingType) -> Connection<T> {
    if paging_type == PagingType::Backward {
        page.rows.reverse();
    }

    let edges: Vec<Edge<T>> = page
        .rows
        .into_iter()
        .map(|node| Edge {
            cursor: encode_cursor(node.cursor()),
            node,
        })
        .collect();

    let page_info = match (edges.first(), edges.last()) {
        (Some(first), Some(last)) => PageInfo {
            start_cursor: Some(first.cursor.clone()),
            end_cursor: Some(last.cursor.clone()),
            has_previous_page: first.node.cursor() > page.min,
            has_next_page: last.node.cursor() < page.max,
        },
        _ => PageInfo {
            start_cursor: None,
            end_cursor: None,
            has_previous_page: false,
            has_next_page: false,
        },
    };

    Connection { edges, page_info }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        cursor: i64,
        name: String,
    }

    impl PagingEntity for Row {
        fn cursor(&self) -> i64 {
            self.cursor
        }
    }

    fn dataset(n: i64) -> Vec<Row> {
        (1..=n)
            .map(|cursor| Row {
                cursor,
                name: format!("row-{cursor}"),
            })
            .collect()
    }

    /// Emulates a row store: filter by the cursor predicate, order by
    /// direction, limit, and report the full dataset's bounds.
    fn fetch(all: &[Row], ctx: PagingCtx) -> PageRows<Row> {
        let min = all.iter().map(|r| r.cursor).min().unwrap_or(0);
        let max = all.iter().map(|r| r.cursor).max().unwrap_or(0);

        let mut rows: Vec<Row> = all
            .iter()
            .filter(|r| match ctx.paging_type {
                PagingType::Forward => r.cursor > ctx.cursor,
                PagingType::Backward => r.cursor < ctx.cursor,
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.cursor);
        if ctx.paging_type == PagingType::Backward {
            rows.reverse();
        }
        rows.truncate(ctx.limit as usize);

        PageRows { rows, min, max }
    }

    async fn page(pager: &Pager, all: &[Row], args: ConnectionArgs) -> Connection<Row> {
        pager
            .connect::<_, PagingError, _, _>(&args, |ctx| {
                let page = fetch(all, ctx);
                async move { Ok(page) }
            })
            .await
            .unwrap()
    }

    fn cursors(conn: &Connection<Row>) -> Vec<i64> {
        conn.edges.iter().map(|e| e.node.cursor).collect()
    }

    // -------------------------------------------------------------------------
    // Cursor codec
    // -------------------------------------------------------------------------

    #[test]
    fn codec_roundtrip() {
        assert_eq!(decode_cursor(Some(&encode_cursor(42)), START_OF_SET), 42);
    }

    #[test]
    fn codec_malformed_degrades_to_boundary() {
        assert_eq!(decode_cursor(Some("not-a-number"), START_OF_SET), START_OF_SET);
        assert_eq!(decode_cursor(Some(""), END_OF_SET), END_OF_SET);
        assert_eq!(decode_cursor(Some("-7"), START_OF_SET), START_OF_SET);
        // dépassement i64 = hors limites, pas une erreur
        assert_eq!(decode_cursor(Some("99999999999999999999"), END_OF_SET), END_OF_SET);
        assert_eq!(decode_cursor(None, START_OF_SET), START_OF_SET);
    }

    // -------------------------------------------------------------------------
    // Context resolver
    // -------------------------------------------------------------------------

    #[test]
    fn resolve_defaults_to_forward_from_start() {
        let ctx = Pager::new(20).resolve(&ConnectionArgs::default()).unwrap();
        assert_eq!(
            ctx,
            PagingCtx {
                cursor: START_OF_SET,
                limit: 20,
                paging_type: PagingType::Forward,
            }
        );
    }

    #[test]
    fn resolve_backward_from_end() {
        let args = ConnectionArgs {
            last: Some(5),
            ..Default::default()
        };
        let ctx = Pager::new(20).resolve(&args).unwrap();
        assert_eq!(ctx.paging_type, PagingType::Backward);
        assert_eq!(ctx.cursor, END_OF_SET);
        assert_eq!(ctx.limit, 5);
    }

    #[test]
    fn resolve_rejects_non_positive_limits() {
        for bad in [0, -1, -100] {
            let args = ConnectionArgs {
                first: Some(bad),
                ..Default::default()
            };
            assert_eq!(
                Pager::new(20).resolve(&args),
                Err(PagingError::NonPositiveLimit(bad))
            );
        }
    }

    #[test]
    fn resolve_rejects_mixed_directions() {
        let args = ConnectionArgs {
            first: Some(2),
            before: Some("9".into()),
            ..Default::default()
        };
        assert_eq!(
            Pager::new(20).resolve(&args),
            Err(PagingError::ConflictingDirections)
        );

        // after + last est tout aussi ambigu
        let args = ConnectionArgs {
            after: Some("3".into()),
            last: Some(2),
            ..Default::default()
        };
        assert_eq!(
            Pager::new(20).resolve(&args),
            Err(PagingError::ConflictingDirections)
        );
    }

    #[test]
    fn resolve_clamps_to_ceiling() {
        let args = ConnectionArgs {
            first: Some(10_000),
            ..Default::default()
        };
        let ctx = Pager::new(20).resolve(&args).unwrap();
        assert_eq!(ctx.limit, MAX_PAGE_LIMIT);
    }

    // -------------------------------------------------------------------------
    // Assembler + connect: the spec'd paging properties
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn default_page_of_twenty_one_rows() {
        // 21 rows, default page size 20: cursors 1..20, more ahead, none behind.
        let all = dataset(21);
        let conn = page(&Pager::new(20), &all, ConnectionArgs::default()).await;

        assert_eq!(cursors(&conn), (1..=20).collect::<Vec<_>>());
        assert!(conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
        assert_eq!(conn.page_info.start_cursor.as_deref(), Some("1"));
        assert_eq!(conn.page_info.end_cursor.as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn first_two_after_one() {
        let all = dataset(21);
        let args = ConnectionArgs {
            first: Some(2),
            after: Some("1".into()),
            ..Default::default()
        };
        let conn = page(&Pager::new(20), &all, args).await;

        assert_eq!(cursors(&conn), vec![2, 3]);
        assert!(conn.page_info.has_next_page);
        assert!(conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn first_n_returns_min_of_n_and_total() {
        let all = dataset(4);
        let args = ConnectionArgs {
            first: Some(10),
            ..Default::default()
        };
        let conn = page(&Pager::new(20), &all, args).await;

        assert_eq!(cursors(&conn), vec![1, 2, 3, 4]);
        assert!(!conn.page_info.has_next_page);
    }

    #[tokio::test]
    async fn last_n_returns_highest_cursors_ascending() {
        let all = dataset(11);
        let args = ConnectionArgs {
            last: Some(5),
            ..Default::default()
        };
        let conn = page(&Pager::new(20), &all, args).await;

        // Highest five rows, still emitted in ascending order.
        assert_eq!(cursors(&conn), vec![7, 8, 9, 10, 11]);
        assert!(!conn.page_info.has_next_page);
        assert!(conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn last_n_before_cursor() {
        let all = dataset(11);
        let args = ConnectionArgs {
            last: Some(2),
            before: Some("11".into()),
            ..Default::default()
        };
        let conn = page(&Pager::new(20), &all, args).await;

        assert_eq!(cursors(&conn), vec![9, 10]);
        assert!(conn.page_info.has_next_page);
        assert!(conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn forward_iteration_tiles_the_set() {
        // Page forward to exhaustion: every row exactly once, no gaps.
        let all = dataset(23);
        let pager = Pager::new(20);

        let mut seen: Vec<i64> = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let args = ConnectionArgs {
                first: Some(5),
                after: after.clone(),
                ..Default::default()
            };
            let conn = page(&pager, &all, args).await;
            seen.extend(cursors(&conn));
            if !conn.page_info.has_next_page {
                break;
            }
            after = conn.page_info.end_cursor.clone();
        }

        assert_eq!(seen, (1..=23).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn page_info_flags_track_dataset_bounds_exactly() {
        let all = dataset(10);
        let pager = Pager::new(20);

        // Page ending exactly on the max: no next page.
        let args = ConnectionArgs {
            first: Some(10),
            ..Default::default()
        };
        let conn = page(&pager, &all, args).await;
        assert_eq!(conn.page_info.end_cursor.as_deref(), Some("10"));
        assert!(!conn.page_info.has_next_page);

        // Page starting exactly on the min: no previous page, even backward.
        let args = ConnectionArgs {
            last: Some(10),
            ..Default::default()
        };
        let conn = page(&pager, &all, args).await;
        assert_eq!(conn.page_info.start_cursor.as_deref(), Some("1"));
        assert!(!conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn identical_args_are_idempotent() {
        let all = dataset(15);
        let pager = Pager::new(20);
        let args = ConnectionArgs {
            first: Some(4),
            after: Some("6".into()),
            ..Default::default()
        };

        let a = page(&pager, &all, args.clone()).await;
        let b = page(&pager, &all, args).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn malformed_after_cursor_pages_from_start() {
        let all = dataset(5);
        let args = ConnectionArgs {
            first: Some(3),
            after: Some("garbage".into()),
            ..Default::default()
        };
        let conn = page(&Pager::new(20), &all, args).await;
        assert_eq!(cursors(&conn), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_dataset_yields_empty_connection() {
        let conn = page(&Pager::new(20), &[], ConnectionArgs::default()).await;
        assert!(conn.edges.is_empty());
        assert_eq!(conn.page_info.start_cursor, None);
        assert_eq!(conn.page_info.end_cursor, None);
        assert!(!conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn finder_errors_propagate_unchanged() {
        let pager = Pager::new(20);
        let result = pager
            .connect::<Row, PagingError, _, _>(&ConnectionArgs::default(), |_ctx| async {
                Err(PagingError::NonPositiveLimit(99))
            })
            .await;
        assert_eq!(result.unwrap_err(), PagingError::NonPositiveLimit(99));
    }
}
