use sea_orm::{ConnectionTrait, PaginatorTrait, SelectorTrait};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const PAGE_SIZE: u64 = 10;

/// Raw `?page=` value. Parsed by [`paginate`] so a malformed page is a 404
/// like any other page that does not exist.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> Result<u64, ApiError> {
        match self.page.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|page| *page > 0)
                .ok_or_else(invalid_page),
        }
    }
}

fn invalid_page() -> ApiError {
    ApiError::NotFound("Invalid page.".to_owned())
}

/// One page of a list endpoint. `next` and `previous` are page numbers.
#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Fetches the 1-based `page` of `select`. Pages past the end are 404, except
/// the first page of an empty list.
pub async fn paginate<'db, C, S>(
    conn: &'db C,
    select: S,
    query: PageQuery,
) -> Result<Page<<S::Selector as SelectorTrait>::Item>, ApiError>
where
    C: ConnectionTrait,
    S: PaginatorTrait<'db, C>,
{
    let page = query.number()?;

    let paginator = select.paginate(conn, PAGE_SIZE);
    let totals = paginator.num_items_and_pages().await?;
    let last_page = totals.number_of_pages.max(1);
    if page > last_page {
        return Err(invalid_page());
    }

    let results = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        count: totals.number_of_items,
        next: (page < last_page).then_some(page + 1),
        previous: (page > 1).then_some(page - 1),
        results,
    })
}
