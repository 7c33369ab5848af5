//! Protobuf descriptor builder for the schema cache.

use crate::proto::parser::{parse_file, ProtoCompiler};
use kafka_types::{Format, SchemaId};
use kbridge_schema_registry::{DescriptorBuilder, Error as RegistryError, TypeDescriptor};
use std::path::{Path, PathBuf};

/// Writes each schema to `<scratch_dir>/schema_<id>.proto` and compiles it.
///
/// The scratch directory is created on first use and never cleaned up here.
#[derive(Debug, Clone)]
pub struct ProtoDescriptorBuilder {
    scratch_dir: PathBuf,
    compiler: ProtoCompiler,
}

impl ProtoDescriptorBuilder {
    pub fn new(scratch_dir: impl Into<PathBuf>, compiler: ProtoCompiler) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            compiler,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn schema_path(&self, id: SchemaId) -> PathBuf {
        self.scratch_dir.join(format!("schema_{id}.proto"))
    }
}

impl DescriptorBuilder for ProtoDescriptorBuilder {
    fn format(&self) -> Format {
        Format::Protobuf
    }

    fn compile(&self, id: SchemaId, text: &str) -> kbridge_schema_registry::Result<TypeDescriptor> {
        let compile_error = |message: String| RegistryError::SchemaCompile {
            format: Format::Protobuf,
            id,
            message,
        };

        std::fs::create_dir_all(&self.scratch_dir)?;
        let path = self.schema_path(id);
        std::fs::write(&path, text)?;
        tracing::debug!("Compiling protobuf schema {id} from {}", path.display());

        let schema = parse_file(&path, &self.compiler).map_err(|e| compile_error(e.to_string()))?;
        Ok(TypeDescriptor::Protobuf(schema))
    }
}
