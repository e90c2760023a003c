use prost::bytes;

use crate::types::{Cell, TableRow};

/// A row encoded as a protobuf message whose field numbers follow column order.
///
/// Values must already be coerced to their destination column types.
#[derive(Debug, Clone)]
pub struct BigQueryTableRow(pub TableRow);

impl From<TableRow> for BigQueryTableRow {
    fn from(row: TableRow) -> Self {
        BigQueryTableRow(row)
    }
}

impl prost::Message for BigQueryTableRow {
    fn encode_raw(&self, buf: &mut impl bytes::BufMut)
    where
        Self: Sized,
    {
        for (tag, cell) in (1..).zip(self.0.values()) {
            cell_encode_prost(cell, tag, buf);
        }
    }

    fn merge_field(
        &mut self,
        _tag: u32,
        _wire_type: prost::encoding::WireType,
        _buf: &mut impl bytes::Buf,
        _ctx: prost::encoding::DecodeContext,
    ) -> Result<(), prost::DecodeError>
    where
        Self: Sized,
    {
        unimplemented!("rows are only ever encoded");
    }

    fn encoded_len(&self) -> usize {
        (1..)
            .zip(self.0.values())
            .map(|(tag, cell)| cell_encoded_len_prost(cell, tag))
            .sum()
    }

    fn clear(&mut self) {
        for cell in self.0.values_mut() {
            *cell = Cell::Null;
        }
    }
}

/// Writes `cell` as field `tag`. Nulls are omitted.
pub fn cell_encode_prost(cell: &Cell, tag: u32, buf: &mut impl bytes::BufMut) {
    match cell {
        Cell::Null => {}
        Cell::Bool(b) => prost::encoding::bool::encode(tag, b, buf),
        Cell::I64(i) => prost::encoding::int64::encode(tag, i, buf),
        Cell::U64(i) => prost::encoding::uint64::encode(tag, i, buf),
        Cell::F64(f) => prost::encoding::double::encode(tag, f, buf),
        Cell::Bytes(b) => prost::encoding::bytes::encode(tag, b, buf),
        Cell::String(s) => prost::encoding::string::encode(tag, s, buf),
        other => prost::encoding::string::encode(tag, &other.to_string(), buf),
    }
}

pub fn cell_encoded_len_prost(cell: &Cell, tag: u32) -> usize {
    match cell {
        Cell::Null => 0,
        Cell::Bool(b) => prost::encoding::bool::encoded_len(tag, b),
        Cell::I64(i) => prost::encoding::int64::encoded_len(tag, i),
        Cell::U64(i) => prost::encoding::uint64::encoded_len(tag, i),
        Cell::F64(f) => prost::encoding::double::encoded_len(tag, f),
        Cell::Bytes(b) => prost::encoding::bytes::encoded_len(tag, b),
        Cell::String(s) => prost::encoding::string::encoded_len(tag, s),
        other => prost::encoding::string::encoded_len(tag, &other.to_string()),
    }
}
