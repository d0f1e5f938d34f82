//! Lookups the parser needs while walking a hierarchy.

use sdmx_metadata::MetadataRegistry;
use sdmx_model::{Warning, Warnings};

/// Display text of one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeText {
    pub label: String,
    pub description: Option<String>,
}

/// Source of code labels and codelist-to-dimension mappings.
pub trait CodeResolver {
    /// Dataflow dimension backed by the codelist.
    fn dimension_for_codelist(&self, codelist: &str, warnings: &mut Warnings) -> Option<String>;

    /// Label and description of a code. `agency` comes from the code's URN.
    fn code_text(
        &self,
        agency: &str,
        codelist: &str,
        code: &str,
        warnings: &mut Warnings,
    ) -> Option<CodeText>;
}

/// Resolver backed by the metadata registry for one dataflow.
pub struct RegistryResolver<'a> {
    registry: &'a MetadataRegistry,
    dataflow: String,
}

impl<'a> RegistryResolver<'a> {
    pub fn new(registry: &'a MetadataRegistry, dataflow: &str) -> Self {
        Self {
            registry,
            dataflow: dataflow.to_string(),
        }
    }
}

impl CodeResolver for RegistryResolver<'_> {
    fn dimension_for_codelist(&self, codelist: &str, warnings: &mut Warnings) -> Option<String> {
        let dimension = self
            .registry
            .dimension_for_codelist(&self.dataflow, codelist, warnings);
        if dimension.is_none() {
            warnings.push(Warning::UnmappedCodelist {
                codelist: codelist.to_string(),
                dataflow: self.dataflow.clone(),
            });
        }
        dimension
    }

    fn code_text(
        &self,
        agency: &str,
        codelist: &str,
        code: &str,
        warnings: &mut Warnings,
    ) -> Option<CodeText> {
        let mut found = self.registry.codelist(&self.dataflow, codelist, warnings);
        if found.is_empty() && !agency.is_empty() {
            found = self.registry.codelist_from_agency(agency, codelist, warnings);
        }
        let entry = found.codes.get(code)?;
        Some(CodeText {
            label: entry.name.clone(),
            description: entry.description.clone(),
        })
    }
}
