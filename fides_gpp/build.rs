use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::{env, fs};
use walkdir::WalkDir;

const TEST_DATA_DIR: &str = "tests/data";

/// Module of the files placed directly in the test data directory.
const ROOT_MODULE: &str = "gpp";

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed={TEST_DATA_DIR}");
    generate_decode_tests()
}

/// Writes one test module per test data directory, holding one `test_case`
/// per JSON file of the directory.
fn generate_decode_tests() -> Result<(), Box<dyn Error>> {
    let modules = group_by_directory(find_data_files())
        .into_iter()
        .map(|(dir, files)| decode_module(&dir, &files));
    let token_stream = quote! {
        #(#modules)*
    };
    let syntax_tree = syn::parse2(token_stream)?;
    let pretty = prettyplease::unparse(&syntax_tree);

    let out_dir = env::var("OUT_DIR")?;
    fs::write(Path::new(&out_dir).join("decode_tests.rs"), pretty)?;

    Ok(())
}

fn find_data_files() -> Vec<PathBuf> {
    WalkDir::new(TEST_DATA_DIR)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "json")
        })
        .map(|e| e.into_path())
        .collect()
}

/// Groups files by their directory relative to the test data directory,
/// turned into a module name.
fn group_by_directory(files: Vec<PathBuf>) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        let module = path
            .parent()
            .and_then(|dir| dir.strip_prefix(TEST_DATA_DIR).ok())
            .and_then(Path::to_str)
            .filter(|dir| !dir.is_empty())
            .map_or_else(
                || ROOT_MODULE.to_string(),
                |dir| dir.replace(['/', '\\', '-', '.'], "_"),
            );
        groups.entry(module).or_default().push(path);
    }
    groups
}

fn decode_module(dir: &str, files: &[PathBuf]) -> TokenStream {
    let module = format_ident!("{dir}");
    let test_cases = files.iter().filter_map(|entry| {
        let path = entry.to_str()?.to_string();
        let name = entry.file_stem()?.to_str()?.to_string();
        Some(quote! {
            #[test_case(#path ; #name)]
        })
    });

    quote! {
        mod #module {
            use test_case::test_case;

            #(#test_cases)*
            fn decode_gpp_string(filename: &str) {
                crate::common::TestCase::load_from_file(filename)
                    .unwrap()
                    .assert_json_matches();
            }
        }
    }
}
