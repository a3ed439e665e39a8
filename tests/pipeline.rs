use approx::assert_relative_eq;
use scout_pipeline::config::{ColumnConfig, PipelineConfig};
use scout_pipeline::io::{load_registry, load_stats, read_stats, write_table};
use scout_pipeline::{AuxTable, Pipeline, PipelineError};
use std::fs::File;
use std::io::Write;

fn no_reduction() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.reduction.enabled = false;
    config
}

#[test]
fn zero_minute_row_is_excluded_before_weighting() {
    let csv = concat!(
        "Player,BasedOnMinutes,scouting_period,Per90_Tackles\n",
        "A. Smith,450,2021-2022,1.0\n",
        "A. Smith,600,2022-2023,2.0\n",
        "A. Smith,0,2023-2024,5.0\n",
    );
    let raw = read_stats(csv.as_bytes(), "defenders", &ColumnConfig::default()).unwrap();

    let out = Pipeline::new(&no_reduction()).run(raw, &[]).unwrap();

    assert_eq!(out.table.n_rows(), 1);
    let tackles = out.table.find("A. Smith").unwrap().get("Per90_Tackles").unwrap();
    assert_relative_eq!(tackles, (1.0 * 450.0 + 2.0 * 600.0) / (450.0 + 600.0), epsilon = 1e-12);
    assert_relative_eq!(tackles, 1.5714, epsilon = 1e-4);
}

#[test]
fn zero_goals_over_zero_xg_reads_as_zero_efficiency() {
    let csv = concat!(
        "Player,BasedOnMinutes,Per90_Goals,Per90_Goals - xG,Per90_Tackles\n",
        "A. Smith,900,0,0,1.0\n",
        "B. Jones,900,0.5,0.25,2.0\n",
        "C. Brown,900,0.2,0.1,0.5\n",
    );
    let raw = read_stats(csv.as_bytes(), "forwards", &ColumnConfig::default()).unwrap();

    let out = Pipeline::new(&no_reduction()).run(raw, &[]).unwrap();

    let a = out.table.find("A. Smith").unwrap();
    assert_eq!(a.get("Finishing_Efficiency"), Some(0.0));
    assert!(out.table.column_index("Per90_Goals").is_none());
    assert!(out.table.column_index("Per90_Goals - xG").is_none());
    assert_eq!(out.summary.skipped_features, 1);
}

#[test]
fn nan_and_na_cells_take_the_zero_fill() {
    let csv = concat!(
        "Player,BasedOnMinutes,Per90_Tackles,Per90_Goals/Shot\n",
        "A,900,1.0,NaN\n",
        "B,900,3.0,N/A\n",
        "C,900,2.0,0.2\n",
    );
    let raw = read_stats(csv.as_bytes(), "forwards", &ColumnConfig::default()).unwrap();

    let out = Pipeline::new(&no_reduction()).run(raw, &[]).unwrap();

    assert_eq!(out.table.columns, vec!["Per90_Tackles", "Per90_Goals/Shot"]);
    assert_eq!(out.table.find("A").unwrap().get("Per90_Goals/Shot"), Some(0.0));
    assert_eq!(out.table.find("B").unwrap().get("Per90_Goals/Shot"), Some(0.0));
    assert_relative_eq!(out.table.find("C").unwrap().get("Per90_Goals/Shot").unwrap(), 0.2);
    assert!(out.table.values.iter().all(|v| v.is_finite()));
}

#[test]
fn player_missing_from_registry_gets_zero_age() {
    let csv = concat!(
        "Player,BasedOnMinutes,Per90_Tackles\n",
        "Alan Smith,900,1.0\n",
        "B. Jones,900,2.0\n",
    );
    let raw = read_stats(csv.as_bytes(), "midfielders", &ColumnConfig::default()).unwrap();
    let mut ages = AuxTable::new("age", vec!["age".to_string()]);
    ages.push("Smith, Alan", vec![Some(28.0)]);
    ages.push("C. Brown", vec![Some(31.0)]);

    let out = Pipeline::new(&no_reduction()).run(raw, &[ages]).unwrap();

    assert_eq!(out.table.find("Smith, Alan").unwrap().get("age"), Some(28.0));
    assert_eq!(out.table.find("B. Jones").unwrap().get("age"), Some(0.0));
    assert_eq!(out.summary.unresolved_identities(), 1);
}

#[test]
fn schema_error_halts_before_any_stage() {
    let csv = "Name,Minutes,Per90_Tackles\nA. Smith,900,1.0\n";
    let err = read_stats(csv.as_bytes(), "defenders", &ColumnConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Schema { ref column, .. } if column == "Player"));
}

#[test]
fn files_to_reduced_table_with_joined_attributes() -> scout_pipeline::Result<()> {
    let dir = tempfile::tempdir()?;

    let stats_path = dir.path().join("forwards_per90.csv");
    let mut stats = File::create(&stats_path)?;
    writeln!(
        stats,
        "Player,Versus,BasedOnMinutes,scouting_period,Per90_Goals,Per90_Goals - xG,\
         Per90_Assists,Per90_xA: Expected Assists,Per90_Shots,Per90_Touches,Percentile_Goals"
    )?;
    let rows = [
        ("Erling Haaland", 1800.0, 0.9, 0.2, 0.1, 0.1, 3.9, 22.0),
        ("Erling Haaland", 900.0, 1.1, 0.3, 0.2, 0.1, 4.4, 25.0),
        ("Bukayo Saka", 2200.0, 0.4, 0.1, 0.4, 0.3, 2.6, 55.0),
        ("Mohamed Salah", 2500.0, 0.7, 0.1, 0.3, 0.3, 3.5, 48.0),
        ("Ollie Watkins", 2400.0, 0.5, 0.0, 0.2, 0.15, 2.9, 30.0),
        ("Son Heung-min", 2000.0, 0.5, 0.05, 0.2, 0.25, 2.4, 41.0),
        ("Unknown Trialist", 500.0, 0.0, 0.0, 0.0, 0.05, 1.0, 18.0),
        ("Benched Player", 200.0, 2.0, 1.0, 1.0, 1.0, 9.0, 90.0),
    ];
    for (name, minutes, g, gx, a, xa, shots, touches) in rows {
        writeln!(
            stats,
            "{},vs,{},2023-2024,{},{},{},{},{},{},50",
            name, minutes, g, gx, a, xa, shots, touches
        )?;
    }
    drop(stats);

    let ages_path = dir.path().join("age_data.csv");
    let mut ages = File::create(&ages_path)?;
    writeln!(ages, "Player,age")?;
    writeln!(ages, "Erling Haaland,24")?;
    writeln!(ages, "Bukayo Saka,23")?;
    writeln!(ages, "Mohamed Salah,32")?;
    writeln!(ages, "Ollie Watkins,29")?;
    writeln!(ages, "Heung-min Son,32")?;
    drop(ages);

    let values_path = dir.path().join("valuations.csv");
    let mut values = File::create(&values_path)?;
    writeln!(values, "player_name,season_start_year,player_market_value_euro")?;
    writeln!(values, "Erling Haaland,2023,180000000")?;
    writeln!(values, "Erling Haaland,2024,200000000")?;
    writeln!(values, "Bukayo Saka,2024,140000000")?;
    writeln!(values, "Mohamed Salah,2024,55000000")?;
    drop(values);

    let config = PipelineConfig::default();
    let raw = load_stats(&stats_path, &config.columns)?;
    let auxiliaries = vec![
        load_registry(&ages_path, &config.auxiliary.age)?,
        load_registry(&values_path, &config.auxiliary.valuation)?,
    ];

    let out = Pipeline::new(&config).run(raw, &auxiliaries)?;

    let summary = &out.summary;
    assert_eq!(summary.filtered_rows, 7);
    assert_eq!(summary.players, 6);
    assert_eq!(summary.engineered_features, 2);
    assert_eq!(summary.skipped_features, 0);
    let k = summary.components.expect("reduction enabled");
    assert!(k >= 1 && k <= summary.retained_features);
    assert!(summary.explained_variance.unwrap() >= 0.95 - 1e-12);

    let table = &out.table;
    assert_eq!(table.n_rows(), 6);
    assert_eq!(table.columns[0], "PCA_1");
    assert_eq!(&table.columns[k..], ["age", "player_market_value_euro"]);
    let son = table.find("Heung-min Son").expect("son resolved to registry spelling");
    assert_eq!(son.get("age"), Some(32.0));
    assert_eq!(son.get("player_market_value_euro"), Some(0.0));
    let haaland = table.find("Erling Haaland").unwrap();
    assert_eq!(haaland.get("player_market_value_euro"), Some(200_000_000.0));
    assert_eq!(table.find("Unknown Trialist").unwrap().get("age"), Some(0.0));
    assert!(table.values.iter().all(|v| v.is_finite()));

    let out_path = dir.path().join("forwards_processed.csv");
    write_table(&out_path, table, &config.columns.identity)?;
    let mut rdr = csv::Reader::from_path(&out_path)?;
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    assert_eq!(header[0], "Player");
    assert_eq!(header.last().map(String::as_str), Some("player_market_value_euro"));
    assert_eq!(rdr.records().count(), 6);
    Ok(())
}
