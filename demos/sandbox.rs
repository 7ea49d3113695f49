use vfs_sandbox::{
    BaselineConfig, BaselineRegistry, CaseSensitivity, DirSource, ListOptions, vpath,
};

fn main() {
    let tmp = std::env::temp_dir().join("vfs_sandbox_demo");
    std::fs::create_dir_all(tmp.join("lib")).unwrap();
    std::fs::write(tmp.join("lib/lib.d.ts"), "declare var x: number;").unwrap();
    println!("Host dir: {}", tmp.display());

    // the baseline copies `<tmp>/lib` to `/.lib` and starts clones in `/project`;
    // nothing is read from the host until the first clone is requested
    let registry = BaselineRegistry::new(DirSource::new(&tmp).unwrap()).with_baseline(
        "built",
        BaselineConfig::new().mount("lib", "/.lib").cwd("/project"),
    );

    // every call returns an independent sandbox over the same snapshot
    let mut first = registry.get("built", CaseSensitivity::Insensitive).unwrap();
    let second = registry.get("built", CaseSensitivity::Insensitive).unwrap();

    // `main.ts` is created in CWD (`/project`) because the filename is relative
    first.add_file("main.ts", "let y = x;").unwrap();
    first.add_symlink("/project/types", "/.lib").unwrap();

    // lookups are case-insensitive and symlinks are followed transparently
    let query = "/PROJECT/Types/LIB.D.TS";
    let entry = first.get_entry(query, true).unwrap().unwrap();
    println!("{query} -> {}", entry.path());

    let options = ListOptions::new().recursive(true).qualified(true);
    for file in first.get_files("/", &options) {
        println!("first:  {file}");
    }

    // the sibling sandbox never sees the writes above
    assert!(!second.file_exists("/project/main.ts"));
    for file in second.get_files("/", &options) {
        println!("second: {file}");
    }

    println!("written: {:?}", first.written_files());
    println!(
        "relative: {}",
        vpath::relative("/project/src", "/.lib/lib.d.ts", false).unwrap()
    );

    std::fs::remove_dir_all(&tmp).unwrap();
}
