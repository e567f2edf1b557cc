//! End-to-end conversion of a small Anchorwave-style MAF against an indexed FASTA,
//! through the library entry point and through the `maf2gvcf` binary.

use maf2gvcf::config::{ConvertConfig, OutputType};
use maf2gvcf::convert::{convert, CancelToken};
use maf2gvcf::error::ConvertError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn get_maf2gvcf_binary() -> PathBuf {
    // CARGO_BIN_EXE_maf2gvcf is set by cargo test for the binary crate
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_maf2gvcf") {
        return PathBuf::from(path);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        manifest_dir.join("target/release/maf2gvcf"),
        manifest_dir.join("target/debug/maf2gvcf"),
    ];
    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }

    PathBuf::from("maf2gvcf")
}

fn write_reference(path: &Path) -> std::io::Result<()> {
    let mut chr7 = "A".repeat(12);
    chr7.push_str("AAAGGGAATGTTAACCAAATGAATTGTCTCTTACGGTG");
    chr7.push_str(&"A".repeat(400));
    chr7.push_str("TAAAGATGGGT");
    fs::write(
        path,
        format!(
            ">chr7\n{chr7}\n>chr1\nGCAGCTGAAAACAGTCAATCTTACACACTTGGGGCCTACT\n>chr10\nGCAGCTGAAAACAGTCAATCTTACACACTTGGGGCCTACT\n"
        ),
    )
}

fn write_maf(path: &Path) -> std::io::Result<()> {
    // Sizes and spacing are kept as Anchorwave wrote them, stale sizes and stray spaces included
    fs::write(
        path,
        "##maf version=1 scoring=Tba.v8\n\n\
a\tscore=23262.0\n\
s\tchr7\t12\t38\t+\t158545518\tAAA-GGGAATGTTAACCAAATGA---ATTGTCTCTTACGGTG\n\
s\tchr4\t81344243\t40\t+\t187371129\t-AA-GGGGATGCTAAGCCAATGAGTTGTTGTCTCTCAATGTG\n\n\
a\tscore=5062.0\n\
s\tchr7\t450\t6\t+\t158545518\tTAAAGAT---GGGT\n\
s\tchr4\t81444246\t6\t+\t 187371129\tTAAGGATCCC---T\n\n\
a\tscore=6636.0\n\
s\tchr1\t0\t40\t+\t 158545518\t-----GCAGCTGAAAACAGTCAATCTTACACACTTGGGGCCTACT\n\
s\tchr6\t53310097\t40\t + 151104725\tAAAAAGACAGCTGAAAATATCAATCTTACACACTTGGGGCCTACT\n\n\
a\tscore=6636.0\n\
s\tchr10\t0\t40\t+\t 158545518\t-----GCAGCTGAAAACAGTCAATCTTACACACTTGGGGCCTACT\n\
s\tchr6\t53310097\t40\t + 151104725\tAAAAAGACAGCTGAAAATATCAATCTTACACACTTGGGGCCTACT\n\n",
    )
}

const CHR1_RECORDS: &[&str] = &[
    "chr1\t1\t.\tG\tAAAAAG,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310103;ASM_Start=53310098;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t2\t.\tC\tA,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310104;ASM_Start=53310104;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t3\t.\tA\tC,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310105;ASM_Start=53310105;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t4\t.\tG\tA,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310106;ASM_Start=53310106;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t5\t.\tC\tG,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310107;ASM_Start=53310107;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t6\t.\tT\tC,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310108;ASM_Start=53310108;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t7\t.\tG\tT,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310109;ASM_Start=53310109;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t8\t.\tA\tG,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310110;ASM_Start=53310110;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t9\t.\tA\t<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310113;ASM_Start=53310111;ASM_Strand=+;END=11\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr1\t12\t.\tC\tA,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310114;ASM_Start=53310114;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t13\t.\tA\tT,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310115;ASM_Start=53310115;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t14\t.\tG\tA,<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310116;ASM_Start=53310116;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr1\t15\t.\tT\t<NON_REF>\t.\t.\tASM_Chr=chr6;ASM_End=53310142;ASM_Start=53310117;ASM_Strand=+;END=40\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
];

const CHR7_RECORDS: &[&str] = &[
    "chr7\t12\t.\tAA\tA,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344243;ASM_Start=81344243;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t14\t.\tA\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344248;ASM_Start=81344244;ASM_Strand=+;END=18\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t19\t.\tA\tG,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344249;ASM_Start=81344249;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t20\t.\tA\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344252;ASM_Start=81344250;ASM_Strand=+;END=22\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t23\t.\tT\tC,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344253;ASM_Start=81344253;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t24\t.\tT\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344256;ASM_Start=81344254;ASM_Strand=+;END=26\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t27\t.\tC\tG,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344257;ASM_Start=81344257;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t28\t.\tC\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344258;ASM_Start=81344258;ASM_Strand=+;END=28\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t29\t.\tA\tC,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344259;ASM_Start=81344259;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t30\t.\tA\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344263;ASM_Start=81344260;ASM_Strand=+;END=33\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t34\t.\tA\tAGTT,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344267;ASM_Start=81344264;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t35\t.\tA\tG,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344268;ASM_Start=81344268;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t36\t.\tT\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344276;ASM_Start=81344269;ASM_Strand=+;END=43\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t44\t.\tT\tC,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344277;ASM_Start=81344277;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t45\t.\tA\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344278;ASM_Start=81344278;ASM_Strand=+;END=45\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t46\t.\tC\tA,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344279;ASM_Start=81344279;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t47\t.\tG\tT,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344280;ASM_Start=81344280;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t48\t.\tG\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81344283;ASM_Start=81344281;ASM_Strand=+;END=50\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t451\t.\tT\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81444249;ASM_Start=81444247;ASM_Strand=+;END=453\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t454\t.\tA\tG,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81444250;ASM_Start=81444250;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t455\t.\tG\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81444253;ASM_Start=81444251;ASM_Strand=+;END=457\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
    "chr7\t458\t.\tG\tC,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81444254;ASM_Start=81444254;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t459\t.\tG\tC,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81444255;ASM_Start=81444255;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t460\t.\tG\tC,<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81444256;ASM_Start=81444256;ASM_Strand=+\tGT:AD:DP:PL\t1:0,30,0:30:90,0,90",
    "chr7\t461\t.\tT\t<NON_REF>\t.\t.\tASM_Chr=chr4;ASM_End=81444257;ASM_Start=81444257;ASM_Strand=+;END=461\tGT:AD:DP:PL\t0:30,0:30:0,90,90",
];

fn expected_records() -> Vec<String> {
    let mut expected: Vec<String> = CHR1_RECORDS.iter().map(|l| l.to_string()).collect();
    expected.extend(CHR7_RECORDS.iter().map(|l| l.to_string()));
    expected.extend(
        CHR1_RECORDS
            .iter()
            .map(|l| l.replacen("chr1\t", "chr10\t", 1)),
    );
    expected
}

fn data_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

struct Inputs {
    _temp_dir: TempDir,
    dir: PathBuf,
    reference: PathBuf,
    maf: PathBuf,
}

fn inputs() -> std::io::Result<Inputs> {
    let temp_dir = TempDir::new()?;
    let dir = temp_dir.path().to_path_buf();
    let reference = dir.join("ref.fa");
    let maf = dir.join("B97.maf");
    write_reference(&reference)?;
    write_maf(&maf)?;
    Ok(Inputs {
        _temp_dir: temp_dir,
        dir,
        reference,
        maf,
    })
}

#[test]
fn test_library_conversion_matches_expected_gvcf() -> std::io::Result<()> {
    let inputs = inputs()?;
    let output = inputs.dir.join("B97.gvcf");

    let mut config = ConvertConfig::new(&inputs.reference, &inputs.maf, &output, "B97");
    config.compress = false;
    let summary = convert(&config, &CancelToken::new()).map_err(std::io::Error::from)?;
    assert!(summary.failures.is_empty());
    assert_eq!(summary.outputs.len(), 1);
    assert!(summary.outputs[0].compressed.is_none());

    let text = fs::read_to_string(&output)?;
    let header: Vec<&str> = text.lines().filter(|l| l.starts_with('#')).collect();
    assert_eq!(header[0], "##fileformat=VCFv4.2");
    let contigs: Vec<&str> = header
        .iter()
        .filter(|l| l.starts_with("##contig"))
        .copied()
        .collect();
    assert_eq!(
        contigs,
        vec![
            "##contig=<ID=chr1,length=40>",
            "##contig=<ID=chr7,length=461>",
            "##contig=<ID=chr10,length=40>",
        ]
    );
    assert_eq!(
        *header.last().unwrap(),
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tB97"
    );

    assert_eq!(data_lines(&text), expected_records());
    assert_eq!(summary.outputs[0].records, expected_records().len());
    Ok(())
}

#[test]
fn test_gap_filled_genotype_only_output() -> std::io::Result<()> {
    let inputs = inputs()?;
    let output = inputs.dir.join("B97.filled.gvcf");

    let mut config = ConvertConfig::new(&inputs.reference, &inputs.maf, &output, "B97");
    config.compress = false;
    config.fill_gaps = true;
    config.out_just_gt = true;
    convert(&config, &CancelToken::new()).map_err(std::io::Error::from)?;

    let text = fs::read_to_string(&output)?;
    let rows: Vec<Vec<String>> = data_lines(&text)
        .iter()
        .map(|l| l.split('\t').map(str::to_string).collect())
        .collect();
    assert!(rows.iter().all(|r| r[8] == "GT"));

    // chr7 is covered from 1 to 461 without overlaps
    let mut next = 1u64;
    for row in rows.iter().filter(|r| r[0] == "chr7") {
        let start: u64 = row[1].parse().unwrap();
        assert_eq!(start, next, "gap or overlap before {}", row[1]);
        let end = row[7]
            .split(';')
            .find_map(|f| f.strip_prefix("END="))
            .map(|v| v.parse::<u64>().unwrap())
            .unwrap_or(start + row[3].len() as u64 - 1);
        next = end + 1;
    }
    assert_eq!(next, 462);

    let first = rows.iter().find(|r| r[0] == "chr7").unwrap();
    assert_eq!(first[1..5], ["1", ".", "A", "<NON_REF>"]);
    assert_eq!(first[7], "END=11");
    Ok(())
}

#[test]
fn test_variants_only_output() -> std::io::Result<()> {
    let inputs = inputs()?;
    let output = inputs.dir.join("B97.vcf");

    let mut config = ConvertConfig::new(&inputs.reference, &inputs.maf, &output, "B97");
    config.compress = false;
    config.fill_gaps = true;
    config.output_type = OutputType::Vcf;
    convert(&config, &CancelToken::new()).map_err(std::io::Error::from)?;

    let text = fs::read_to_string(&output)?;
    let expected: Vec<String> = expected_records()
        .into_iter()
        .filter(|l| !l.contains("\t<NON_REF>\t"))
        .collect();
    assert_eq!(data_lines(&text), expected);
    Ok(())
}

#[test]
fn test_compressed_output() -> std::io::Result<()> {
    let inputs = inputs()?;
    let output = inputs.dir.join("B97.gvcf");

    let config = ConvertConfig::new(&inputs.reference, &inputs.maf, &output, "B97");
    let summary = convert(&config, &CancelToken::new()).map_err(std::io::Error::from)?;

    // Indexing needs bcftools on PATH; its absence only produces a warning
    assert!(summary
        .warnings
        .iter()
        .all(|w| matches!(w, ConvertError::ExternalTool(_))));
    let compressed = summary.outputs[0].compressed.clone().unwrap();
    assert_eq!(compressed, inputs.dir.join("B97.gvcf.gz"));
    assert!(compressed.exists());
    assert!(output.exists());
    Ok(())
}

#[test]
fn test_diploid_outputs() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let reference = temp_dir.path().join("ref.fa");
    let maf = temp_dir.path().join("diploid.maf");
    fs::write(&reference, ">chr1\nACGTACGTAC\n")?;
    fs::write(
        &maf,
        "a score=1.0\n\
s chr1 0 10 + 10 ACGTACGTAC\n\
s hapA.chr1 100 10 + 500 ACGTTCGTAC\n\
s hapB.chr1 200 10 + 500 ACGTACGAAC\n",
    )?;
    let output = temp_dir.path().join("S1.gvcf");

    let mut config = ConvertConfig::new(&reference, &maf, &output, "S1");
    config.compress = false;
    config.two_gvcfs = true;
    let summary = convert(&config, &CancelToken::new()).map_err(std::io::Error::from)?;
    assert_eq!(summary.outputs.len(), 2);

    let first = data_lines(&fs::read_to_string(temp_dir.path().join("S1_1.gvcf"))?);
    let second = data_lines(&fs::read_to_string(temp_dir.path().join("S1_2.gvcf"))?);
    let variants = |lines: &[String]| -> Vec<String> {
        lines
            .iter()
            .filter(|l| !l.contains("\t<NON_REF>\t"))
            .map(|l| l.split('\t').take(5).collect::<Vec<_>>().join(" "))
            .collect()
    };
    assert_eq!(variants(&first), vec!["chr1 5 . A T,<NON_REF>"]);
    assert_eq!(variants(&second), vec!["chr1 8 . T A,<NON_REF>"]);
    assert!(first.iter().all(|l| l.contains("ASM_Chr=hapA.chr1")));
    Ok(())
}

#[test]
fn test_binary_conversion() -> std::io::Result<()> {
    let inputs = inputs()?;
    let output = inputs.dir.join("B97.cli.gvcf");

    let result = Command::new(get_maf2gvcf_binary())
        .arg("maf-to-gvcf")
        .arg("--reference-file")
        .arg(&inputs.reference)
        .arg("--maf-file")
        .arg(&inputs.maf)
        .arg("-o")
        .arg(&output)
        .arg("--sample-name")
        .arg("B97")
        .arg("--compress-off")
        .output()?;
    assert!(result.status.success(), "maf2gvcf failed: {result:?}");

    let text = fs::read_to_string(&output)?;
    assert_eq!(data_lines(&text), expected_records());
    Ok(())
}

#[test]
fn test_binary_rejects_bad_options() -> std::io::Result<()> {
    let inputs = inputs()?;
    let output = inputs.dir.join("B97.gvcf");

    let result = Command::new(get_maf2gvcf_binary())
        .arg("maf-to-gvcf")
        .arg("--reference-file")
        .arg(&inputs.reference)
        .arg("--maf-file")
        .arg(&inputs.maf)
        .arg("-o")
        .arg(&output)
        .arg("--sample-name")
        .arg("B97")
        .arg("--output-type")
        .arg("bcf")
        .output()?;
    assert!(!result.status.success());
    assert!(!output.exists());
    Ok(())
}
