use tracing::trace;

mod cursor;
mod instruction;
mod section;
mod types;
mod value;

pub use cursor::Cursor;

use crate::core::Module;
use crate::error::DecodeError;

/// Reads a vector: a varuint32 count followed by that many elements.
macro_rules! read_vec {
    ($cursor:expr, $read:expr) => {{
        let count = $cursor.read_var_u32()?;
        let mut items = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            items.push($read);
        }
        items
    }};
}
pub(crate) use read_vec;

const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d]; // "\0asm"
const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Parses a binary module. Fails on the first malformed byte; the error
/// carries the offset where decoding stopped.
pub fn decode_module(bytes: &[u8]) -> Result<Module, DecodeError> {
    let mut cursor = Cursor::new(bytes);

    if bytes.len() < 8 {
        return Err(cursor.error("input too short to be a wasm module"));
    }
    if cursor.read_bytes(4)? != WASM_MAGIC {
        return Err(cursor.error("invalid magic number"));
    }
    if cursor.read_bytes(4)? != WASM_VERSION {
        return Err(cursor.error("unsupported version"));
    }

    let mut module = Module::default();
    let mut function_types: Vec<u32> = Vec::new();

    while cursor.has_remaining() {
        let id = cursor.read_byte()?;
        let size = cursor.read_var_u32()? as usize;
        if size > cursor.remaining() {
            return Err(cursor.error(format!("section {id} extends past end of input")));
        }
        let end = cursor.position() + size;
        trace!(section = id, size, "decoding section");

        match id {
            0 => cursor.seek(end)?, // custom section, skipped
            1 => module.types = cursor.read_type_section()?,
            2 => module.imports = cursor.read_import_section()?,
            3 => function_types = cursor.read_function_section()?,
            4 => module.tables = cursor.read_table_section()?,
            5 => module.memories = cursor.read_memory_section()?,
            6 => module.globals = cursor.read_global_section()?,
            7 => module.exports = cursor.read_export_section()?,
            8 => module.start = Some(cursor.read_var_u32()?),
            9 => module.elements = cursor.read_element_section()?,
            10 => module.functions = cursor.read_code_section(&function_types)?,
            11 => module.data = cursor.read_data_section()?,
            _ => return Err(cursor.error(format!("unknown section id: {id}"))),
        }

        if cursor.position() != end {
            return Err(cursor.error(format!(
                "section {id} content does not match its declared size"
            )));
        }
    }

    if module.functions.len() != function_types.len() {
        return Err(cursor.error(format!(
            "function section declares {} functions but the code section has {}",
            function_types.len(),
            module.functions.len()
        )));
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExportDesc, ValueType};

    // (module
    //   (func (export "add") (param i32 i32) (result i32)
    //     local.get 0 local.get 1 i32.add))
    const ADD: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x01, 0x07, 0x01, 0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f, // type section
        0x03, 0x02, 0x01, 0x00, // function section
        0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00, // export section
        0x0a, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b, // code section
    ];

    #[test]
    fn decodes_a_minimal_module() {
        let module = decode_module(ADD).unwrap();
        assert_eq!(module.types.len(), 1);
        assert_eq!(
            module.types[0].params,
            vec![ValueType::I32, ValueType::I32]
        );
        assert_eq!(module.functions.len(), 1);
        assert_eq!(
            module.functions[0].body.as_ref(),
            &[0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b][..]
        );
        let export = module.find_export("add").unwrap();
        assert_eq!(export.desc, ExportDesc::Func(0));
    }

    #[test]
    fn decodes_imports_of_every_kind() {
        let mut bytes = ADD[..8].to_vec();
        let mut imports: Vec<u8> = vec![0x04]; // count
        // "wasi_snapshot_preview1" "fd_write" (func 0)
        imports.push(22);
        imports.extend_from_slice(b"wasi_snapshot_preview1");
        imports.push(8);
        imports.extend_from_slice(b"fd_write");
        imports.extend_from_slice(&[0x00, 0x00]);
        // "env" "t" (table funcref 1..2)
        imports.extend_from_slice(&[0x03, b'e', b'n', b'v', 0x01, b't']);
        imports.extend_from_slice(&[0x01, 0x70, 0x01, 0x01, 0x02]);
        // "env" "m" (memory 1)
        imports.extend_from_slice(&[0x03, b'e', b'n', b'v', 0x01, b'm']);
        imports.extend_from_slice(&[0x02, 0x00, 0x01]);
        // "env" "g" (global (mut f64))
        imports.extend_from_slice(&[0x03, b'e', b'n', b'v', 0x01, b'g']);
        imports.extend_from_slice(&[0x03, 0x7c, 0x01]);
        bytes.push(0x02);
        bytes.push(imports.len() as u8);
        bytes.extend_from_slice(&imports);

        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.imports.len(), 4);
        assert_eq!(module.imported_function_count(), 1);
        assert_eq!(module.imports[0].module, "wasi_snapshot_preview1");
        assert_eq!(module.imports[0].field, "fd_write");
        assert!(matches!(
            module.imports[1].desc,
            crate::core::ImportDesc::Table(_)
        ));
        assert!(matches!(
            module.imports[2].desc,
            crate::core::ImportDesc::Memory(_)
        ));
        assert!(matches!(
            module.imports[3].desc,
            crate::core::ImportDesc::Global(_)
        ));
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        assert!(decode_module(&[0x00, 0x61, 0x73]).is_err());
        let mut bad_magic = ADD.to_vec();
        bad_magic[0] = 0x01;
        assert!(decode_module(&bad_magic).is_err());
        let mut bad_version = ADD.to_vec();
        bad_version[4] = 0x02;
        assert!(decode_module(&bad_version).is_err());
    }

    #[test]
    fn rejects_unknown_sections_and_skips_custom_ones() {
        let mut unknown = ADD.to_vec();
        unknown.extend_from_slice(&[0x0d, 0x01, 0x00]);
        let err = decode_module(&unknown).unwrap_err();
        assert!(err.message.contains("unknown section"));

        let mut custom = ADD.to_vec();
        custom.extend_from_slice(&[0x00, 0x03, 0x01, b'h', b'i']);
        assert!(decode_module(&custom).is_ok());
    }

    #[test]
    fn rejects_section_size_mismatch() {
        let mut oversized = ADD.to_vec();
        oversized[9] += 1; // type section claims one byte more than its content
        assert!(decode_module(&oversized).is_err());
    }

    #[test]
    fn rejects_function_code_count_mismatch() {
        // function section declares one function, code section missing
        let bytes: Vec<u8> = ADD[..21].to_vec();
        let err = decode_module(&bytes).unwrap_err();
        assert!(err.message.contains("code section"));
    }
}
