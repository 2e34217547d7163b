//! Plan binding and evaluation.

use std::any::Any;
use std::cmp::Ordering;

use nexus_stmt::{
    ColumnMeta, CommandClass, CompileError, CompileRequest, CompiledPlan, Engine, InvokeError,
    InvokeErrorKind, ObjectName, ParamDeclaration, ParamSlot, Row, SqlType,
};
use nexus_wire::Value;

use super::catalog::{Catalog, Table};
use super::sql::{Ast, CmpOp, Operand, Predicate};
use super::value::{coerce, compare};

/// What running a plan produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A result set.
    Rows(Vec<Row>),
    /// An affected-row count.
    Affected(u64),
}

/// A bound statement.
#[derive(Debug)]
pub struct MockPlan {
    ast: Ast,
    command: CommandClass,
    columns: Vec<ColumnMeta>,
    projection: Vec<usize>,
    dependencies: Vec<ObjectName>,
    versions: Vec<(String, u64)>,
    param_types: Vec<SqlType>,
    engine: Engine,
    refresh: bool,
}

impl CompiledPlan for MockPlan {
    fn command(&self) -> CommandClass {
        self.command
    }

    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn engine(&self) -> Engine {
        self.engine
    }

    fn dependencies(&self) -> &[ObjectName] {
        &self.dependencies
    }

    fn requires_refresh(&self) -> bool {
        self.refresh
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Binding
// =============================================================================

struct Binder<'a> {
    request: &'a CompileRequest<'a>,
    params: Vec<Option<ParamDeclaration>>,
}

impl Binder<'_> {
    /// Declares a placeholder. A cast pins the type; otherwise a hint wins
    /// over the type inferred from context.
    fn declare(&mut self, operand: &Operand, context: SqlType) {
        let Operand::Param {
            index,
            position,
            cast,
        } = operand
        else {
            return;
        };
        let declaration = match cast {
            Some(cast) => ParamDeclaration::pinned(*cast, *position),
            None => ParamDeclaration::new(self.request.hint(*index).unwrap_or(context), *position),
        };
        if self.params.len() <= *index {
            self.params.resize(*index + 1, None);
        }
        self.params[*index] = Some(declaration);
    }

    fn bind_filter(&mut self, table: &Table, filter: &[Predicate]) -> Result<(), CompileError> {
        for predicate in filter {
            let column = table
                .column_index(&predicate.column)
                .ok_or_else(|| unknown_column(&predicate.column, &table.name))?;
            self.declare(&predicate.operand, table.columns[column].sql_type);
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<ParamDeclaration>, CompileError> {
        self.params
            .into_iter()
            .enumerate()
            .map(|(i, decl)| {
                decl.ok_or_else(|| CompileError::Syntax(format!("placeholder {i} not bound")))
            })
            .collect()
    }
}

fn unknown_column(column: &str, table: &str) -> CompileError {
    CompileError::UnknownObject(format!("column {column} in {table}"))
}

fn table(catalog: &Catalog, name: &str) -> Result<Table, CompileError> {
    catalog
        .get(name)
        .ok_or_else(|| CompileError::UnknownObject(format!("table {name}")))
}

fn literal_type(value: &Value) -> SqlType {
    match value {
        Value::Int(_) => SqlType::BIGINT,
        Value::UInt(_) => SqlType::BIGINT_UNSIGNED,
        Value::Double(_) => SqlType::Float,
        Value::Decimal(_) => SqlType::Decimal,
        Value::Null | Value::Bytes(_) | Value::Temporal(_) => SqlType::String,
    }
}

/// Binds `ast` against the catalog.
pub fn bind(
    ast: Ast,
    catalog: &Catalog,
    request: &CompileRequest<'_>,
    refresh: bool,
) -> Result<(MockPlan, Vec<ParamDeclaration>), CompileError> {
    let mut binder = Binder {
        request,
        params: Vec::new(),
    };
    let mut columns = Vec::new();
    let mut projection = Vec::new();
    let mut touched: Option<Table> = None;

    let command = match &ast {
        Ast::Select {
            columns: selected,
            table: name,
            filter,
        } => {
            let table = table(catalog, name)?;
            projection = match selected {
                None => (0..table.columns.len()).collect(),
                Some(names) => names
                    .iter()
                    .map(|c| table.column_index(c).ok_or_else(|| unknown_column(c, name)))
                    .collect::<Result<_, _>>()?,
            };
            columns = projection.iter().map(|&i| table.columns[i].clone()).collect();
            binder.bind_filter(&table, filter)?;
            touched = Some(table);
            CommandClass::Select
        }
        Ast::SelectValues(operands) => {
            for operand in operands {
                binder.declare(operand, SqlType::String);
                columns.push(match operand {
                    Operand::Literal(v) => ColumnMeta::new(v.to_string(), literal_type(v)),
                    Operand::Param { index, .. } => {
                        let declared = binder.params[*index].map_or(SqlType::String, |d| d.declared);
                        ColumnMeta::new("?", declared)
                    }
                });
            }
            CommandClass::Select
        }
        Ast::Insert {
            table: name,
            values,
        } => {
            let table = table(catalog, name)?;
            if values.len() != table.columns.len() {
                return Err(CompileError::Syntax(format!(
                    "column count {} does not match value count {}",
                    table.columns.len(),
                    values.len()
                )));
            }
            for (operand, column) in values.iter().zip(&table.columns) {
                binder.declare(operand, column.sql_type);
            }
            touched = Some(table);
            CommandClass::Insert
        }
        Ast::Delete {
            table: name,
            filter,
        } => {
            let table = table(catalog, name)?;
            binder.bind_filter(&table, filter)?;
            touched = Some(table);
            CommandClass::Delete
        }
        Ast::CreateTable { .. } => CommandClass::Ddl,
        Ast::DropTable { table: name } => {
            touched = Some(table(catalog, name)?);
            CommandClass::Ddl
        }
        Ast::ShowTables => {
            columns.push(ColumnMeta::new("Tables", SqlType::String).not_null());
            CommandClass::Show
        }
    };

    let params = binder.finish()?;
    let (dependencies, versions) = match touched {
        Some(t) => (vec![ObjectName::new(t.name.clone())], vec![(t.name, t.version)]),
        None => (Vec::new(), Vec::new()),
    };
    let plan = MockPlan {
        ast,
        command,
        columns,
        projection,
        dependencies,
        versions,
        param_types: params.iter().map(|p| p.declared).collect(),
        engine: request.engine,
        refresh,
    };
    Ok((plan, params))
}

// =============================================================================
// Evaluation
// =============================================================================

impl MockPlan {
    /// Tables and metadata versions the plan was bound against.
    pub fn versions(&self) -> &[(String, u64)] {
        &self.versions
    }

    /// Returns true if the plan produces rows.
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }

    fn operand(&self, operand: &Operand, params: &[ParamSlot]) -> Result<Value, InvokeError> {
        match operand {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Param { index, .. } => {
                let slot = params.get(*index).ok_or_else(|| {
                    InvokeError::internal(format!("placeholder {index} has no bound value"))
                })?;
                coerce(slot.value(), self.param_types[*index])
            }
        }
    }

    fn matches(
        &self,
        table: &Table,
        filter: &[Predicate],
        row: &Row,
        params: &[ParamSlot],
    ) -> Result<bool, InvokeError> {
        for predicate in filter {
            let Some(column) = table.column_index(&predicate.column) else {
                return Err(InvokeError::stale(format!("column {} is gone", predicate.column)));
            };
            let rhs = self.operand(&predicate.operand, params)?;
            let ordering = compare(&row[column], &rhs);
            let hit = match (predicate.op, ordering) {
                (_, None) => false,
                (CmpOp::Eq, Some(o)) => o == Ordering::Equal,
                (CmpOp::Ne, Some(o)) => o != Ordering::Equal,
                (CmpOp::Lt, Some(o)) => o == Ordering::Less,
                (CmpOp::Le, Some(o)) => o != Ordering::Greater,
                (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
                (CmpOp::Ge, Some(o)) => o != Ordering::Less,
            };
            if !hit {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Runs the plan.
    pub fn run(&self, catalog: &Catalog, params: &[ParamSlot]) -> Result<Output, InvokeError> {
        let missing = |name: &str| InvokeError::stale(format!("table {name} no longer exists"));
        match &self.ast {
            Ast::Select {
                table: name,
                filter,
                ..
            } => {
                let table = catalog.get(name).ok_or_else(|| missing(name))?;
                let mut rows = Vec::new();
                for row in &table.rows {
                    if self.matches(&table, filter, row, params)? {
                        rows.push(self.projection.iter().map(|&i| row[i].clone()).collect());
                    }
                }
                Ok(Output::Rows(rows))
            }
            Ast::SelectValues(operands) => {
                let row = operands
                    .iter()
                    .map(|o| self.operand(o, params))
                    .collect::<Result<Row, _>>()?;
                Ok(Output::Rows(vec![row]))
            }
            Ast::Insert {
                table: name,
                values,
            } => {
                let table = catalog.get(name).ok_or_else(|| missing(name))?;
                let mut row = Row::with_capacity(values.len());
                for (operand, column) in values.iter().zip(&table.columns) {
                    let value = coerce(&self.operand(operand, params)?, column.sql_type)?;
                    if value.is_null() && !column.nullable {
                        return Err(InvokeError::new(
                            InvokeErrorKind::Constraint,
                            format!("column '{}' cannot be null", column.name),
                        ));
                    }
                    row.push(value);
                }
                catalog
                    .with_table_mut(name, |t| t.rows.push(row))
                    .ok_or_else(|| missing(name))?;
                Ok(Output::Affected(1))
            }
            Ast::Delete {
                table: name,
                filter,
            } => {
                let table = catalog.get(name).ok_or_else(|| missing(name))?;
                let mut keep = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    keep.push(!self.matches(&table, filter, row, params)?);
                }
                let removed = keep.iter().filter(|k| !**k).count() as u64;
                catalog.with_table_mut(name, |t| {
                    let mut flags = keep.iter();
                    t.rows.retain(|_| flags.next().copied().unwrap_or(true));
                });
                Ok(Output::Affected(removed))
            }
            Ast::CreateTable {
                table: name,
                columns,
            } => {
                if catalog.contains(name) {
                    return Err(InvokeError::new(
                        InvokeErrorKind::Data,
                        format!("table '{name}' already exists"),
                    ));
                }
                catalog.create(name, columns.clone());
                Ok(Output::Affected(0))
            }
            Ast::DropTable { table: name } => {
                if !catalog.drop_table(name) {
                    return Err(missing(name));
                }
                Ok(Output::Affected(0))
            }
            Ast::ShowTables => Ok(Output::Rows(
                catalog
                    .names()
                    .into_iter()
                    .map(|n| vec![Value::text(&n)])
                    .collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::sql::parse;

    fn catalog() -> Catalog {
        let catalog = Catalog::new();
        catalog.create(
            "t",
            vec![
                ColumnMeta::new("id", SqlType::BIGINT).not_null(),
                ColumnMeta::new("x", SqlType::String),
            ],
        );
        catalog
    }

    fn request<'a>(text: &'a str, hints: &'a [Option<SqlType>]) -> CompileRequest<'a> {
        CompileRequest {
            text,
            database: None,
            hints,
            engine: Engine::Primary,
        }
    }

    #[test]
    fn test_bind_infers_from_column() {
        let catalog = catalog();
        let req = request("SELECT x FROM t WHERE id = ?", &[]);
        let (plan, params) = bind(parse(req.text).unwrap(), &catalog, &req, false).unwrap();
        assert_eq!(params[0].declared, SqlType::BIGINT);
        assert!(!params[0].pinned);
        assert_eq!(plan.columns().len(), 1);
        assert_eq!(plan.dependencies(), &[ObjectName::new("t")]);
        assert_eq!(plan.command(), CommandClass::Select);
    }

    #[test]
    fn test_bind_hint_and_cast() {
        let catalog = catalog();
        let hints = [Some(SqlType::Decimal), Some(SqlType::Decimal)];
        let req = request("SELECT * FROM t WHERE id = ? AND x = CAST(? AS CHAR)", &hints);
        let (_, params) = bind(parse(req.text).unwrap(), &catalog, &req, false).unwrap();
        assert_eq!(params[0].declared, SqlType::Decimal);
        assert_eq!(params[1].declared, SqlType::String);
        assert!(params[1].pinned);
    }

    #[test]
    fn test_bind_unknown_objects() {
        let catalog = catalog();
        let req = request("SELECT * FROM missing", &[]);
        assert!(matches!(
            bind(parse(req.text).unwrap(), &catalog, &req, false),
            Err(CompileError::UnknownObject(_))
        ));
        let req = request("SELECT nope FROM t", &[]);
        assert!(matches!(
            bind(parse(req.text).unwrap(), &catalog, &req, false),
            Err(CompileError::UnknownObject(_))
        ));
    }

    #[test]
    fn test_run_without_params() {
        let catalog = catalog();
        let req = request("INSERT INTO t VALUES (1, 'one')", &[]);
        let (plan, _) = bind(parse(req.text).unwrap(), &catalog, &req, false).unwrap();
        assert_eq!(plan.run(&catalog, &[]).unwrap(), Output::Affected(1));

        let req = request("SELECT x FROM t WHERE id >= 1", &[]);
        let (plan, _) = bind(parse(req.text).unwrap(), &catalog, &req, false).unwrap();
        assert_eq!(
            plan.run(&catalog, &[]).unwrap(),
            Output::Rows(vec![vec![Value::text("one")]])
        );

        let req = request("INSERT INTO t VALUES (NULL, 'two')", &[]);
        let (plan, _) = bind(parse(req.text).unwrap(), &catalog, &req, false).unwrap();
        let err = plan.run(&catalog, &[]).unwrap_err();
        assert_eq!(err.kind, InvokeErrorKind::Constraint);
    }
}
