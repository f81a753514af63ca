//! Dataset payloads
//!
//! A dataset travels as an inline `xs:schema` describing its tables and
//! columns, followed by a `diffgr:diffgram` holding the rows.

use super::primitive::{parse_primitive, schema_type, XS_NS};
use crate::error::DeserializeError;
use crate::typeref::TypeRef;
use crate::value::{DataColumnValue, DataSetValue, DataTableValue, Value, DEFAULT_DATASET_NAME};
use soapreplay_trace::{NamespaceScope, XmlElement};

/// Dataset annotation namespace
pub const MSDATA_NS: &str = "urn:schemas-microsoft-com:xml-msdata";

/// Diffgram namespace
pub const DIFFGR_NS: &str = "urn:schemas-microsoft-com:xml-diffgram-v1";

/// Read a dataset element of runtime type `ty`
pub(crate) fn read_dataset(
    element: &XmlElement,
    ty: &TypeRef,
    typed: bool,
    scope: &mut NamespaceScope,
) -> Result<Value, DeserializeError> {
    let schema = element
        .child(Some(XS_NS), "schema")
        .ok_or_else(|| DeserializeError::DataSet("missing inline schema".into()))?;
    let mark = scope.enter(schema);
    let parsed = read_schema(schema, ty, typed, scope);
    scope.truncate(mark);
    let mut dataset = parsed?;

    if let Some(diffgram) = element.child(Some(DIFFGR_NS), "diffgram") {
        let mark = scope.enter(diffgram);
        let rows = read_rows(diffgram, &mut dataset, scope);
        scope.truncate(mark);
        rows?;
    }
    tracing::trace!(
        dataset = %dataset.name,
        tables = dataset.tables.len(),
        "read dataset"
    );
    Ok(Value::DataSet(dataset))
}

fn read_schema(
    schema: &XmlElement,
    ty: &TypeRef,
    typed: bool,
    scope: &mut NamespaceScope,
) -> Result<DataSetValue, DeserializeError> {
    let namespace = schema.attribute("targetNamespace").unwrap_or_default().to_string();
    let root = schema
        .elements()
        .find(|e| {
            e.is(Some(XS_NS), "element")
                && e.attribute_ns(Some(MSDATA_NS), "IsDataSet") == Some("true")
        })
        .or_else(|| schema.child(Some(XS_NS), "element"))
        .ok_or_else(|| DeserializeError::DataSet("schema declares no dataset element".into()))?;

    let name = root
        .attribute("name")
        .or_else(|| schema.attribute("id"))
        .unwrap_or(DEFAULT_DATASET_NAME)
        .to_string();
    let locale = match root.attribute_ns(Some(MSDATA_NS), "UseCurrentLocale") {
        Some("true") => None,
        _ => root.attribute_ns(Some(MSDATA_NS), "Locale").map(str::to_string),
    };

    let mut tables = Vec::new();
    let choice = root
        .child(Some(XS_NS), "complexType")
        .and_then(|ct| ct.child(Some(XS_NS), "choice").or_else(|| ct.child(Some(XS_NS), "sequence")));
    for table in choice.into_iter().flat_map(|c| c.elements()) {
        if !table.is(Some(XS_NS), "element") {
            continue;
        }
        let table_name = table
            .attribute("name")
            .ok_or_else(|| DeserializeError::DataSet("table without a name".into()))?;
        let mark = scope.enter(table);
        let columns = read_columns(table, scope);
        scope.truncate(mark);
        tables.push(DataTableValue {
            name: table_name.to_string(),
            namespace: namespace.clone(),
            columns,
            rows: Vec::new(),
        });
    }

    Ok(DataSetValue {
        ty: ty.clone(),
        typed,
        name,
        namespace,
        locale,
        tables,
    })
}

fn read_columns(table: &XmlElement, scope: &NamespaceScope) -> Vec<DataColumnValue> {
    let sequence = table
        .child(Some(XS_NS), "complexType")
        .and_then(|ct| ct.child(Some(XS_NS), "sequence"));
    sequence
        .into_iter()
        .flat_map(|s| s.elements())
        .filter(|c| c.is(Some(XS_NS), "element"))
        .filter_map(|column| {
            let name = column.attribute("name")?;
            Some(DataColumnValue {
                name: name.to_string(),
                ty: column_type(column, scope),
            })
        })
        .collect()
}

/// Column type from `msdata:DataType` or the `type` attribute; text otherwise
fn column_type(column: &XmlElement, scope: &NamespaceScope) -> TypeRef {
    if let Some(clr) = column.attribute_ns(Some(MSDATA_NS), "DataType") {
        let name = clr.split(',').next().unwrap_or(clr).trim();
        if let Ok(ty) = name.parse::<TypeRef>() {
            return ty;
        }
    }
    column
        .attribute("type")
        .and_then(|t| {
            let q = scope.resolve_qname(t);
            schema_type(q.namespace.as_deref(), &q.local)
        })
        .unwrap_or_else(|| TypeRef::Primitive(crate::typeref::PrimitiveKind::String))
}

fn read_rows(
    diffgram: &XmlElement,
    dataset: &mut DataSetValue,
    scope: &mut NamespaceScope,
) -> Result<(), DeserializeError> {
    let Some(data) = diffgram.elements().find(|e| e.namespace() != Some(DIFFGR_NS)) else {
        return Ok(());
    };
    let mark = scope.enter(data);
    let result = data.elements().try_for_each(|row| {
        let Some(table) = dataset.tables.iter_mut().find(|t| t.name == row.local_name()) else {
            tracing::debug!(element = row.local_name(), "ignoring row for undeclared table");
            return Ok(());
        };
        let cells = table
            .columns
            .iter()
            .map(|column| {
                row.child_local(&column.name)
                    .map(|cell| read_cell(cell, &column.ty, scope))
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;
        table.rows.push(cells);
        Ok(())
    });
    scope.truncate(mark);
    result
}

fn read_cell(cell: &XmlElement, ty: &TypeRef, scope: &NamespaceScope) -> Result<Value, DeserializeError> {
    let text = cell.text();
    match ty.primitive() {
        Some(kind) => parse_primitive(kind, &text, scope).map(Value::Primitive),
        None => Ok(Value::string(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PrimitiveValue;
    use pretty_assertions::assert_eq;

    const PAYLOAD: &str = r#"<ds>
      <xs:schema id="Shop" xmlns="" xmlns:xs="http://www.w3.org/2001/XMLSchema"
                 xmlns:msdata="urn:schemas-microsoft-com:xml-msdata">
        <xs:element name="Shop" msdata:IsDataSet="true" msdata:Locale="en-GB">
          <xs:complexType>
            <xs:choice minOccurs="0" maxOccurs="unbounded">
              <xs:element name="Orders">
                <xs:complexType>
                  <xs:sequence>
                    <xs:element name="Id" type="xs:int" minOccurs="0"/>
                    <xs:element name="Ref" msdata:DataType="System.Guid, mscorlib" type="xs:string" minOccurs="0"/>
                    <xs:element name="Note" type="xs:string" minOccurs="0"/>
                  </xs:sequence>
                </xs:complexType>
              </xs:element>
            </xs:choice>
          </xs:complexType>
        </xs:element>
      </xs:schema>
      <diffgr:diffgram xmlns:msdata="urn:schemas-microsoft-com:xml-msdata"
                       xmlns:diffgr="urn:schemas-microsoft-com:xml-diffgram-v1">
        <Shop>
          <Orders diffgr:id="Orders1" msdata:rowOrder="0">
            <Id>1</Id><Ref>0f8fad5b-d9cb-469f-a165-70867728950e</Ref><Note>first</Note>
          </Orders>
          <Orders diffgr:id="Orders2" msdata:rowOrder="1"><Id>2</Id></Orders>
        </Shop>
      </diffgr:diffgram>
    </ds>"#;

    #[test]
    fn reads_schema_and_rows() {
        let element = XmlElement::parse_str(PAYLOAD).unwrap();
        let ty: TypeRef = "System.Data.DataSet".parse().unwrap();
        let Value::DataSet(ds) = read_dataset(&element, &ty, false, &mut NamespaceScope::new()).unwrap() else {
            panic!("not a dataset");
        };
        assert_eq!(ds.name, "Shop");
        assert_eq!(ds.locale.as_deref(), Some("en-GB"));
        let table = &ds.tables[0];
        assert_eq!(table.name, "Orders");
        assert_eq!(
            table.columns.iter().map(|c| c.ty.to_string()).collect::<Vec<_>>(),
            vec!["int", "System.Guid", "string"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], Some(Value::Primitive(PrimitiveValue::Int32(1))));
        assert!(matches!(table.rows[0][1], Some(Value::Primitive(PrimitiveValue::Guid(_)))));
        assert_eq!(table.rows[1][2], None);
    }

    #[test]
    fn missing_schema_is_an_error() {
        let element = XmlElement::parse_str("<ds/>").unwrap();
        let ty: TypeRef = "System.Data.DataSet".parse().unwrap();
        assert!(matches!(
            read_dataset(&element, &ty, false, &mut NamespaceScope::new()),
            Err(DeserializeError::DataSet(_))
        ));
    }
}
