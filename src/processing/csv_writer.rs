use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nalgebra::DVector;

use crate::discretization::Mesh;
use crate::numerics::solver::IterationRecord;

/// Write columns of data to a CSV file with headers.
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    if !headers.is_empty() && !data.is_empty() && headers.len() != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                data.len()
            ),
        ));
    }

    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{}", headers.join(","))?;

    let n_rows = data.iter().map(|col| col.len()).max().unwrap_or(0);
    for i in 0..n_rows {
        let row: Vec<String> = data
            .iter()
            .map(|col| col.get(i).map_or_else(String::new, |v| format!("{v:.15e}")))
            .collect();
        writeln!(file, "{}", row.join(","))?;
    }
    file.flush()
}

/// A node-major field with `components` values per node.
pub struct NodalField<'a> {
    pub name: &'a str,
    pub values: &'a DVector<f64>,
    pub components: usize,
}

/// One row per node: coordinates followed by every field component.
/// Multi-component fields get `name_0`, `name_1`, ... columns.
pub fn write_nodal_fields<P: AsRef<Path>>(path: P, mesh: &Mesh, fields: &[NodalField]) -> io::Result<()> {
    let n = mesh.num_nodes();
    let mut headers: Vec<String> = ["x", "y", "z"][..mesh.spatial_dim].iter().map(|s| s.to_string()).collect();
    let mut columns: Vec<Vec<f64>> = (0..mesh.spatial_dim)
        .map(|d| (0..n).map(|node| mesh.node_coords(node)[d]).collect())
        .collect();

    for field in fields {
        if field.values.len() != n * field.components {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Field '{}' has {} values, expected {} nodes x {} components",
                    field.name,
                    field.values.len(),
                    n,
                    field.components
                ),
            ));
        }
        for k in 0..field.components {
            headers.push(if field.components == 1 {
                field.name.to_string()
            } else {
                format!("{}_{k}", field.name)
            });
            columns.push((0..n).map(|node| field.values[node * field.components + k]).collect());
        }
    }

    let headers: Vec<&str> = headers.iter().map(String::as_str).collect();
    write_csv(path, &headers, &columns)
}

/// Newton iteration table; iterations that stopped before an update get an
/// empty increment cell.
pub fn write_newton_history<P: AsRef<Path>>(path: P, history: &[IterationRecord]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "iter,residual,fraction,step_percent,increment")?;
    for row in history {
        let increment = row.increment.map_or_else(String::new, |v| format!("{v:.15e}"));
        writeln!(
            file,
            "{},{:.15e},{:.15e},{:.15e},{increment}",
            row.iteration, row.residual, row.fraction, row.step_percent
        )?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_bar;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("topofem_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_write_csv() {
        let path = temp_path("columns.csv");
        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0], vec![7.0, 8.0, 9.0]];
        write_csv(&path, &["x", "y", "z"], &data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "x,y,z");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].contains(",,"));
        fs::remove_file(&path).ok();

        assert!(write_csv(&path, &["x"], &data).is_err());
    }

    #[test]
    fn nodal_fields_are_split_by_component() {
        let mesh = create_bar(1.0, 2);
        let path = temp_path("nodal.csv");
        let u = DVector::from_vec(vec![0.0, 0.5, 1.0]);
        let pair = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        write_nodal_fields(
            &path,
            &mesh,
            &[
                NodalField {
                    name: "u",
                    values: &u,
                    components: 1,
                },
                NodalField {
                    name: "q",
                    values: &pair,
                    components: 2,
                },
            ],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("x,u,q_0,q_1"));
        assert_eq!(content.lines().count(), 4);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn history_rows() {
        let path = temp_path("history.csv");
        let history = [
            IterationRecord {
                iteration: 0,
                residual: 1.0,
                fraction: 1.0,
                step_percent: 0.0,
                increment: Some(0.5),
            },
            IterationRecord {
                iteration: 1,
                residual: 1e-12,
                fraction: 1e-12,
                step_percent: 100.0,
                increment: None,
            },
        ];
        write_newton_history(&path, &history).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().last().is_some_and(|l| l.starts_with("1,") && l.ends_with(',')));
        fs::remove_file(&path).ok();
    }
}
