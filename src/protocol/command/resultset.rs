use crate::error::Result;
use crate::protocol::BinaryRowPayload;
use crate::protocol::primitive::*;
use crate::protocol::value::NullBitmap;

/// Result set metadata header (column count only; used by both protocols).
#[derive(Debug, Clone)]
pub struct ResultSetHeader {
    pub column_count: u64,
}

pub fn read_resultset_header(payload: &[u8]) -> Result<ResultSetHeader> {
    let (column_count, _rest) = read_int_lenenc(payload)?;
    Ok(ResultSetHeader { column_count })
}

/// Read a binary protocol row packet (`Protocol::BinaryResultsetRow`).
///
/// The null bitmap uses the `+2` bit offset mandated for result-set rows
/// (as opposed to the `+0` offset used for bound parameters), giving a
/// bitmap length of `(num_columns + 7 + 2) / 8` bytes.
pub fn read_binary_row(payload: &[u8], num_columns: usize) -> Result<BinaryRowPayload<'_>> {
    let (header, data) = read_int_1(payload)?;
    if header != 0x00 {
        return Err(crate::error::Error::InvalidPacket);
    }

    let null_bitmap_len = (num_columns + 7 + 2) / 8;
    let (bitmap, values) = read_string_fix(data, null_bitmap_len)?;

    Ok(BinaryRowPayload {
        null_bitmap: NullBitmap::for_result_set(bitmap),
        values,
        num_columns,
    })
}
