//! Select and find builders.

use ferrent_core::query::{Column, Join, OrderBy};
use ferrent_core::{
    Aggregate, Col, Entity, FieldId, JoinKind, Operation, Query, QueryKind, Table, TableToken,
};

use crate::database::Shared;
use crate::error::{Error, ProgrammerError, Result};
use crate::exec::{impl_session_options, Session};
use crate::filter::Condition;
use crate::mutation::{key_predicates, non_zero_predicates};
use crate::projection::{EntityRows, Operand, Projection, Selector};

struct JoinSpec {
    kind: JoinKind,
    left: Selector,
    right: Selector,
}

/// A select over a projection.
///
/// The `FROM` table is the one given to [`Select::from`], or else the table
/// of the first projected column.
pub struct Select<'a, P: Projection> {
    session: Session<'a>,
    projection: P,
    from: Option<TableToken>,
    joins: Vec<JoinSpec>,
    filter: Option<Condition>,
    order_by: Vec<(Selector, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<'a, P: Projection> Select<'a, P> {
    pub(crate) fn new(shared: &'a Shared, projection: P) -> Self {
        Self::with_session(Session::new(shared), projection)
    }

    pub(crate) const fn with_session(session: Session<'a>, projection: P) -> Self {
        Self {
            session,
            projection,
            from: None,
            joins: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Selects from `table`.
    #[must_use]
    pub fn from<E: Entity>(mut self, table: &Table<E>) -> Self {
        self.from = Some(table.token());
        self
    }

    /// `JOIN` the table of `right` on `left = right`. `left` belongs to a
    /// table already in scope. The two columns may differ in nullability,
    /// as a nullable foreign key does from the key it references.
    #[must_use]
    pub fn join<L, R>(self, left: Col<L>, right: Col<R>) -> Self {
        self.push_join(JoinKind::Inner, left.id(), right.id())
    }

    /// `LEFT JOIN` the table of `right` on `left = right`.
    #[must_use]
    pub fn left_join<L, R>(self, left: Col<L>, right: Col<R>) -> Self {
        self.push_join(JoinKind::Left, left.id(), right.id())
    }

    /// `RIGHT JOIN` the table of `right` on `left = right`.
    #[must_use]
    pub fn right_join<L, R>(self, left: Col<L>, right: Col<R>) -> Self {
        self.push_join(JoinKind::Right, left.id(), right.id())
    }

    fn push_join(mut self, kind: JoinKind, left: FieldId, right: FieldId) -> Self {
        self.joins.push(JoinSpec {
            kind,
            left: Selector::Field(left),
            right: Selector::Field(right),
        });
        self
    }

    /// Restricts the rows. Repeated calls are combined with `AND`.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Ascending `ORDER BY` term.
    #[must_use]
    pub fn order_by_asc<T>(mut self, operand: impl Operand<T>) -> Self {
        self.order_by.push((operand.selector(), false));
        self
    }

    /// Descending `ORDER BY` term.
    #[must_use]
    pub fn order_by_desc<T>(mut self, operand: impl Operand<T>) -> Self {
        self.order_by.push((operand.selector(), true));
        self
    }

    /// `LIMIT`
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `OFFSET`
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn from_table(&self, selectors: &[Selector]) -> Result<TableToken> {
        match (self.from, selectors.first()) {
            (Some(token), _) => Ok(token),
            (None, Some(selector)) => Ok(selector.field().table_token()),
            (None, None) => Err(ProgrammerError::EmptyProjection.into()),
        }
    }

    fn base_query(&self, from: TableToken) -> Result<Query> {
        let shared = self.session.shared;
        let mut query = Query::new(QueryKind::Select, Some(shared.table_ref(from)?));
        for join in &self.joins {
            let right = join.right.resolve(shared)?;
            query.joins.push(Join {
                kind: join.kind,
                table: right.table_ref(),
                left: join.left.resolve(shared)?,
                right,
            });
        }
        query.filter = self
            .filter
            .as_ref()
            .map(|condition| condition.resolve(shared))
            .transpose()?;
        Ok(query)
    }

    fn build(&self) -> Result<Query> {
        let shared = self.session.shared;
        let mut selectors = Vec::new();
        self.projection.selectors(&mut selectors);
        let mut query = self.base_query(self.from_table(&selectors)?)?;
        query.columns = selectors
            .iter()
            .map(|selector| selector.resolve(shared))
            .collect::<Result<_>>()?;
        query.order_by = self
            .order_by
            .iter()
            .map(|(selector, descending)| {
                Ok(OrderBy {
                    column: selector.resolve(shared)?,
                    descending: *descending,
                })
            })
            .collect::<Result<_>>()?;
        query.limit = self.limit;
        query.offset = self.offset;
        Ok(query)
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<P::Output>> {
        let rows = self.session.fetch(query).await?;
        rows.into_iter()
            .map(|row| {
                self.projection
                    .decode(&mut row.into_iter())
                    .map_err(Error::from)
            })
            .collect()
    }

    /// Fetches every matching row.
    ///
    /// # Errors
    ///
    /// Returns a programmer error for foreign or unregistered tokens, the
    /// translated driver error, or [`Error::Value`] when a row does not
    /// decode.
    pub async fn all(self) -> Result<Vec<P::Output>> {
        let query = self.build()?;
        self.fetch(&query).await
    }

    /// Fetches the first matching row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when nothing matches, otherwise as
    /// [`Select::all`].
    pub async fn one(self) -> Result<P::Output> {
        self.optional().await?.ok_or(Error::NotFound)
    }

    /// Fetches the first matching row, if any.
    ///
    /// # Errors
    ///
    /// See [`Select::all`].
    pub async fn optional(self) -> Result<Option<P::Output>> {
        let mut query = self.build()?;
        query.limit = Some(1);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    /// Counts the matching rows, ignoring order, limit and offset.
    ///
    /// # Errors
    ///
    /// See [`Select::all`].
    pub async fn count(&self) -> Result<u64> {
        let query = self.count_query()?;
        let rows = self.session.fetch(&query).await?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(ferrent_core::SqlValue::Int(0));
        let total = <i64 as ferrent_core::FieldValue>::from_value(value)?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn count_query(&self) -> Result<Query> {
        let shared = self.session.shared;
        let mut selectors = Vec::new();
        self.projection.selectors(&mut selectors);
        let from = self.from_table(&selectors)?;
        let mut query = self.base_query(from)?;
        let entity = shared
            .catalog
            .entity(from.table)
            .ok_or(Error::Programmer(ProgrammerError::UnregisteredField(from.field(0))))?;
        let key = entity
            .primary_keys
            .first()
            .ok_or(Error::Programmer(ProgrammerError::UnknownEntity(entity.type_name)))?;
        query.columns = vec![Column {
            schema: entity.schema.clone(),
            table: entity.table.clone(),
            name: key.attribute.column.clone(),
            aggregate: Some(Aggregate::Count),
            function: None,
        }];
        Ok(query)
    }

    /// Fetches page `page` (starting at 1) of `size` rows together with the
    /// total count. A page or size of zero is treated as one.
    ///
    /// # Errors
    ///
    /// See [`Select::all`].
    pub async fn pagination(mut self, page: u64, size: u64) -> Result<Pagination<P::Output>> {
        let page = page.max(1);
        let size = size.max(1);
        let total = self.count().await?;
        self.limit = Some(size);
        self.offset = Some((page - 1).saturating_mul(size));
        let query = self.build()?;
        let values = self.fetch(&query).await?;
        Ok(Pagination::new(values, total, page, size))
    }
}

impl_session_options!([<'a, P: Projection>] Select<'a, P>);

/// One page of a select.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination<T> {
    /// Rows of this page.
    pub values: Vec<T>,
    /// Matching rows across all pages.
    pub total_values: u64,
    /// Number of pages.
    pub total_pages: u64,
    /// Rows on this page.
    pub page_values: u64,
    /// Requested page size.
    pub page_size: u64,
    /// Page number, starting at 1.
    pub current_page: u64,
    /// A page before this one exists.
    pub has_previous: bool,
    /// A page after this one exists.
    pub has_next: bool,
    /// 1-based position of the first row of the page; 0 when empty.
    pub start_index: u64,
    /// 1-based position of the last row of the page; 0 when empty.
    pub end_index: u64,
}

impl<T> Pagination<T> {
    fn new(values: Vec<T>, total_values: u64, page: u64, size: u64) -> Self {
        let page_values = values.len() as u64;
        let total_pages = total_values.div_ceil(size);
        let offset = (page - 1).saturating_mul(size);
        let (start_index, end_index) = if page_values == 0 {
            (0, 0)
        } else {
            (offset + 1, offset + page_values)
        };
        Self {
            values,
            total_values,
            total_pages,
            page_values,
            page_size: size,
            current_page: page,
            has_previous: page > 1,
            has_next: page < total_pages,
            start_index,
            end_index,
        }
    }
}

/// Looks a single row up from the fields of a value.
pub struct Find<'a, E: Entity> {
    session: Session<'a>,
    table: &'a Table<E>,
}

impl<'a, E: Entity> Find<'a, E> {
    pub(crate) fn new(shared: &'a Shared, table: &'a Table<E>) -> Self {
        Self {
            session: Session::new(shared),
            table,
        }
    }

    /// Finds the row matching every non-zero field of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no row matches or `value` has no
    /// non-zero field.
    pub async fn by_value(self, value: &E) -> Result<E> {
        let entity = self.session.shared.entity::<E>(self.table.token())?;
        let predicates = non_zero_predicates(entity, value);
        self.run(predicates).await
    }

    /// Finds the row whose primary key equals the key of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no row matches or the key of
    /// `value` is zero.
    pub async fn by_key(self, value: &E) -> Result<E> {
        let entity = self.session.shared.entity::<E>(self.table.token())?;
        let predicates = key_predicates(entity, value);
        self.run(predicates).await
    }

    async fn run(self, predicates: Vec<Operation>) -> Result<E> {
        let Some(filter) = Operation::all(predicates) else {
            return Err(Error::NotFound);
        };
        let select = Select::with_session(self.session, EntityRows::<E>::new(self.table.token()));
        let mut query = select.build()?;
        query.filter = Some(filter);
        query.limit = Some(1);
        select
            .fetch(&query)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NotFound)
    }
}

impl_session_options!([<'a, E: Entity>] Find<'a, E>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_metadata() {
        let page = Pagination::new(vec![7, 8], 12, 3, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_values, 2);
        assert!(page.has_previous);
        assert!(!page.has_next);
        assert_eq!(page.start_index, 11);
        assert_eq!(page.end_index, 12);
    }

    #[test]
    fn test_pagination_empty() {
        let page: Pagination<i64> = Pagination::new(Vec::new(), 0, 1, 10);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_previous);
        assert!(!page.has_next);
        assert_eq!((page.start_index, page.end_index), (0, 0));
    }

    #[test]
    fn test_first_page_of_many() {
        let page = Pagination::new(vec![1, 2, 3], 10, 1, 3);
        assert_eq!(page.total_pages, 4);
        assert!(page.has_next);
        assert_eq!((page.start_index, page.end_index), (1, 3));
    }
}
